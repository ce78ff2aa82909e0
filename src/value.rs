use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::relation::Relation;

/// A literal value flowing through a dawdle program.
///
/// Cells of a relation, members of a set, and arguments to row-level
/// functions are all `Value`s. The language keeps integers and floats
/// apart, and adds two exact kinds JSON lacks: decimals and datetimes.
///
/// # Examples
///
/// ```
/// use dawdle_lang::Value;
///
/// let n = Value::Integer(42);
/// let h = Value::Header("price".to_string());
/// assert!(n.is_truthy());
/// assert_eq!(h.to_source(), ":price");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null literal
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// Exact decimal, written with a `$` sigil: `$12.50`
    Decimal(Decimal),

    /// Datetime, written with a `~` sigil: `~2020-11-27T14:30:00`
    DateTime(NaiveDateTime),

    /// UTF-8 string
    String(String),

    /// A header name carried as a value (member of a header set)
    Header(String),
}

impl Value {
    /// Check if the value is truthy (for filter results)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Integer(n) => *n != 0,
            Float(n) => *n != 0.0,
            Decimal(d) => !d.is_zero(),
            DateTime(_) => true,
            String(s) => !s.is_empty(),
            Header(_) => true,
        }
    }

    /// Render the value back in source form, so that re-parsing the
    /// rendered text reconstructs an equal value. Used by the macro
    /// expander's template substitution and by the serializer.
    pub fn to_source(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => {
                // keep a decimal point so the literal stays a float
                if n.fract() == 0.0 {
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }
            Value::Decimal(d) => format!("${}", d),
            Value::DateTime(dt) => format!("~{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::String(s) => format!("\"{}\"", escape(s)),
            Value::Header(h) => format!(":{}", h),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Header(h) => write!(f, "{}", h),
            other => write!(f, "{}", other.to_source()),
        }
    }
}

fn escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\r' => vec!['\\', 'r'],
            '\t' => vec!['\\', 't'],
            c => vec![c],
        })
        .collect()
}

/// The result of compiling a section or a single operator line.
///
/// Every evaluated construct carries exactly one of these tags; the
/// per-operator validators key off it before any rows are touched.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// A deduplicated, order-preserving collection of literal values
    Set(Vec<Value>),

    /// A schema without rows, produced by `name:*` references and
    /// header-only passes
    Headers(Vec<String>),

    /// A materialized relation: schema plus row set
    Relation(Relation),
}

impl Compiled {
    /// Human-readable tag name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Compiled::Set(_) => "set",
            Compiled::Headers(_) => "headers",
            Compiled::Relation(_) => "relation",
        }
    }
}
