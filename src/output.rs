//! JSON rendering of compiled values.
//!
//! Hosts and the CLI consume compiled relations and sets as JSON. The
//! mapping is deterministic: relations keep header order, rows keep
//! first-seen order, and the exact kinds JSON cannot carry (decimals,
//! datetimes) are rendered as strings.

use serde_json::{Map, Number, json};

use crate::value::{Compiled, Value};

/// Convert a compiled value into a `serde_json::Value`.
pub fn compiled_to_json(compiled: &Compiled) -> serde_json::Value {
    match compiled {
        Compiled::Set(members) => {
            json!({ "set": members.iter().map(value_to_json).collect::<Vec<_>>() })
        }
        Compiled::Headers(headers) => json!({ "headers": headers }),
        Compiled::Relation(rel) => {
            let mut out = Map::new();
            out.insert("headers".to_string(), json!(rel.headers));
            out.insert(
                "rows".to_string(),
                json!(
                    rel.rows
                        .iter()
                        .map(|row| row.iter().map(value_to_json).collect::<Vec<_>>())
                        .collect::<Vec<_>>()
                ),
            );
            serde_json::Value::Object(out)
        }
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => json!(b),
        Value::Integer(n) => json!(n),
        Value::Float(n) => Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Decimal(d) => json!(d.to_string()),
        Value::DateTime(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Value::String(s) => json!(s),
        Value::Header(h) => json!(format!(":{}", h)),
    }
}

/// Compact JSON string for a compiled value.
pub fn to_json(compiled: &Compiled) -> String {
    compiled_to_json(compiled).to_string()
}

/// Pretty-printed JSON string for a compiled value.
pub fn to_json_pretty(compiled: &Compiled) -> String {
    serde_json::to_string_pretty(&compiled_to_json(compiled))
        .unwrap_or_else(|_| compiled_to_json(compiled).to_string())
}
