/// Ordered children of a composite node. Child order is source order
/// and is semantically significant everywhere it appears.
pub type Section = Vec<Node>;

/// Canonical AST node: exactly one variant per language construct.
///
/// Leaf variants carry the literal token payload as text; resolving a
/// payload into a runtime [`Value`](crate::Value) is the compiler's
/// job, so the tree itself stays a faithful, re-serializable image of
/// the source.
///
/// # Examples
///
/// ```
/// use dawdle_lang::{parse, Node};
///
/// let ast = parse("| :a |\n| 1 |\n").unwrap();
/// match ast {
///     Node::Section(items) => assert_eq!(items.len(), 1),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // Composite kinds
    /// Top-level compilable unit: declarations then body items
    Section(Section),

    /// `let name` + nested section: `[Var(name), Section]`
    Let(Section),

    /// `def op formal...` + nested section:
    /// `[Var(op), formal..., Section]`
    Def(Section),

    /// Operator line: optional leading `Operator`/`Var`, then argument
    /// values, then an optional trailing nested `Section`
    Line(Section),

    /// `:out fn value...` inside a `G` line's trailing block:
    /// `[HeaderName(out), Var(fn), value...]`
    Aggregator(Section),

    /// `(map value) \`template\``: `[value, Template]`
    MapMacro(Section),

    /// `name=value`: `[Var(name), value]`
    NamedValue(Section),

    /// Bracketed set literal: ordered member values
    Set(Section),

    /// Pipe table: `[RlHeaders, RlRow...]`
    RelationLiteral(Section),

    /// Header row of a relation literal: `[HeaderName...]`
    RlHeaders(Section),

    /// Data row of a relation literal: `[literal...]`
    RlRow(Section),

    // Leaf kinds
    /// Integer or float literal text
    Number(String),

    /// String literal (escapes already decoded)
    Str(String),

    /// `true` or `false`
    Bool(String),

    /// `null`
    Null,

    /// Decimal literal text, without the `$` sigil
    Decimal(String),

    /// Datetime literal text, without the `~` sigil
    DateTime(String),

    /// Backtick template body, placeholders intact
    Template(String),

    /// Bare identifier
    Var(String),

    /// `name:` relation reference, without the colon
    RelationName(String),

    /// `:name` header reference, without the colon
    HeaderName(String),

    /// `name:*` all-headers marker, relation name only
    AllHeaders(String),

    /// Built-in operator symbol (`>`, `v`, `^`, `X`, `U`, `-`, `J`, `G`)
    Operator(String),
}

impl Node {
    /// The section items of a `Section` node, if this is one.
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Node::Section(items) => Some(items),
            _ => None,
        }
    }

    /// True for `let`/`def` declaration nodes.
    pub fn is_declaration(&self) -> bool {
        matches!(self, Node::Let(_) | Node::Def(_))
    }
}
