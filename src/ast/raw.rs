/// Grammar rule names.
///
/// The parser emits one [`Raw`] node per rule application. Some rules
/// (`Value`, `Body`) exist only to keep the grammar readable; the
/// normalizer collapses them and keeps the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    // Composite rules
    Section,
    Body,
    Let,
    Def,
    Line,
    Aggregator,
    MapMacro,
    NamedValue,
    Set,
    RelationLiteral,
    RlHeaders,
    RlRow,
    Value,

    // Leaf rules
    Number,
    Str,
    Bool,
    Null,
    Decimal,
    DateTime,
    Template,
    Var,
    RelationName,
    HeaderName,
    AllHeaders,
    Operator,
}

/// A node of the raw, grammar-shaped parse tree.
///
/// Leaves keep the literal token text; branches keep their children in
/// source order. No semantic interpretation happens at this level.
#[derive(Debug, Clone, PartialEq)]
pub enum Raw {
    Branch { rule: Rule, children: Vec<Raw> },
    Leaf { rule: Rule, text: String },
}

impl Raw {
    pub fn branch(rule: Rule, children: Vec<Raw>) -> Raw {
        Raw::Branch { rule, children }
    }

    pub fn leaf(rule: Rule, text: impl Into<String>) -> Raw {
        Raw::Leaf {
            rule,
            text: text.into(),
        }
    }

    pub fn rule(&self) -> Rule {
        match self {
            Raw::Branch { rule, .. } => *rule,
            Raw::Leaf { rule, .. } => *rule,
        }
    }
}
