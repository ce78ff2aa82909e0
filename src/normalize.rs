//! Raw-tree to canonical-AST conversion.
//!
//! A pure structural transform: pass-through rules (`Value`, `Body`)
//! are collapsed away, multi-child rules keep their children as an
//! ordered list, leaf rules keep their token text. No semantic
//! validation happens here; malformed trees surface later as compile
//! errors.

use crate::ast::node::Node;
use crate::ast::raw::{Raw, Rule};

/// Convert a raw grammar-shaped tree into the canonical tagged tree.
pub fn normalize(raw: &Raw) -> Node {
    match raw {
        Raw::Branch { rule, children } => match rule {
            // readability-only rules: collapse to the single child
            Rule::Value | Rule::Body => match children.as_slice() {
                [only] => normalize(only),
                _ => Node::Section(normalize_all(children)),
            },
            Rule::Section => Node::Section(normalize_all(children)),
            Rule::Let => Node::Let(normalize_all(children)),
            Rule::Def => Node::Def(normalize_all(children)),
            Rule::Line => Node::Line(normalize_all(children)),
            Rule::Aggregator => Node::Aggregator(normalize_all(children)),
            Rule::MapMacro => Node::MapMacro(normalize_all(children)),
            Rule::NamedValue => Node::NamedValue(normalize_all(children)),
            Rule::Set => Node::Set(normalize_all(children)),
            Rule::RelationLiteral => Node::RelationLiteral(normalize_all(children)),
            Rule::RlHeaders => Node::RlHeaders(normalize_all(children)),
            Rule::RlRow => Node::RlRow(normalize_all(children)),
            // leaf rules never appear as branches
            _ => Node::Section(normalize_all(children)),
        },
        Raw::Leaf { rule, text } => match rule {
            Rule::Number => Node::Number(text.clone()),
            Rule::Str => Node::Str(text.clone()),
            Rule::Bool => Node::Bool(text.clone()),
            Rule::Null => Node::Null,
            Rule::Decimal => Node::Decimal(text.clone()),
            Rule::DateTime => Node::DateTime(text.clone()),
            Rule::Template => Node::Template(text.clone()),
            Rule::Var => Node::Var(text.clone()),
            Rule::RelationName => Node::RelationName(text.clone()),
            Rule::HeaderName => Node::HeaderName(text.clone()),
            Rule::AllHeaders => Node::AllHeaders(text.clone()),
            Rule::Operator => Node::Operator(text.clone()),
            // composite rules never appear as leaves
            _ => Node::Null,
        },
    }
}

fn normalize_all(children: &[Raw]) -> Vec<Node> {
    children.iter().map(normalize).collect()
}
