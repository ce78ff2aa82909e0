//! The standard row-level and aggregate functions.
//!
//! Everything here goes through the generic registration contract:
//! a name bound to [`Binding::Function`] carrying an operator kind and
//! a callback. The compiler dispatches on the binding alone, so hosts
//! can register additional functions onto [`standard_env`] the same
//! way without touching the compiler.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::env::{Binding, Env, StdFunction};
use crate::value::Value;

/// Build the environment holding the standard library.
pub fn standard_env() -> Env {
    let mut env = Env::new();

    // filters: first argument is the row value under test
    env = register_filter(env, "eq", |args| {
        binary(args, "eq").map(|(a, b)| Value::Boolean(a == b))
    });
    env = register_filter(env, "ne", |args| {
        binary(args, "ne").map(|(a, b)| Value::Boolean(a != b))
    });
    env = register_filter(env, "lt", |args| compare(args, "lt", Ordering::is_lt));
    env = register_filter(env, "gt", |args| compare(args, "gt", Ordering::is_gt));
    env = register_filter(env, "lte", |args| compare(args, "lte", Ordering::is_le));
    env = register_filter(env, "gte", |args| compare(args, "gte", Ordering::is_ge));
    env = register_filter(env, "like", like);

    // extend functions: compute one new cell per row
    env = register_extend(env, "plus", |args| arithmetic(args, "plus"));
    env = register_extend(env, "minus", |args| arithmetic(args, "minus"));
    env = register_extend(env, "times", |args| arithmetic(args, "times"));
    env = register_extend(env, "concat", |args| {
        let mut out = String::new();
        for arg in args {
            out.push_str(&arg.to_string());
        }
        Ok(Value::String(out))
    });

    // aggregates: consume one column per input header
    env = register_aggregate(env, "sum", sum);
    env = register_aggregate(env, "min", |cols| extremum(cols, "min", Ordering::is_lt));
    env = register_aggregate(env, "max", |cols| extremum(cols, "max", Ordering::is_gt));
    env = register_aggregate(env, "count", |cols| {
        let n = cols.first().map(|c| c.len()).unwrap_or(0);
        Ok(Value::Integer(n as i64))
    });
    env = register_aggregate(env, "first", |cols| {
        Ok(cols
            .first()
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or(Value::Null))
    });

    env
}

fn register_filter(
    env: Env,
    name: &str,
    callback: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
) -> Env {
    env.bind(
        name,
        Binding::Function(StdFunction::filter(name, Arc::new(callback))),
    )
}

fn register_extend(
    env: Env,
    name: &str,
    callback: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
) -> Env {
    env.bind(
        name,
        Binding::Function(StdFunction::extend(name, Arc::new(callback))),
    )
}

fn register_aggregate(
    env: Env,
    name: &str,
    callback: impl Fn(&[Vec<Value>]) -> Result<Value, String> + Send + Sync + 'static,
) -> Env {
    env.bind(
        name,
        Binding::Function(StdFunction::aggregate(name, Arc::new(callback))),
    )
}

fn binary<'a>(args: &'a [Value], name: &str) -> Result<(&'a Value, &'a Value), String> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(format!("{} takes exactly 2 arguments, got {}", name, args.len())),
    }
}

fn compare(
    args: &[Value],
    name: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, String> {
    let (a, b) = binary(args, name)?;
    let ordering = order(a, b)?;
    Ok(Value::Boolean(accept(ordering)))
}

/// Ordering across the comparable kinds. Numbers of different kinds
/// compare through `Decimal`; everything else only against itself.
fn order(a: &Value, b: &Value) -> Result<Ordering, String> {
    if let (Some(da), Some(db)) = (to_decimal(a), to_decimal(b)) {
        return Ok(da.cmp(&db));
    }
    match (a, b) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (a, b) => Err(format!(
            "cannot compare {} and {}",
            a.to_source(),
            b.to_source()
        )),
    }
}

fn to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Integer(n) => Some(Decimal::from(*n)),
        Value::Float(n) => Decimal::from_f64(*n),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn like(args: &[Value]) -> Result<Value, String> {
    let (value, pattern) = binary(args, "like")?;
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let pattern = match pattern {
        Value::String(p) => p,
        other => return Err(format!("like pattern must be a string, got {}", other.to_source())),
    };
    let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
    Ok(Value::Boolean(re.is_match(&text)))
}

/// Fold the arguments left to right, preserving the numeric kind:
/// all-integer stays integer, any decimal promotes to decimal, any
/// float promotes to float.
fn arithmetic(args: &[Value], name: &str) -> Result<Value, String> {
    if args.len() < 2 {
        return Err(format!("{} takes at least 2 arguments", name));
    }
    let mut acc = args[0].clone();
    for arg in &args[1..] {
        acc = apply(&acc, arg, name)?;
    }
    Ok(acc)
}

fn apply(a: &Value, b: &Value, name: &str) -> Result<Value, String> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => match name {
            "plus" => x.checked_add(*y),
            "minus" => x.checked_sub(*y),
            _ => x.checked_mul(*y),
        }
        .map(Value::Integer)
        .ok_or_else(|| format!("{} overflowed on {} and {}", name, x, y)),
        (Value::Float(_), _) | (_, Value::Float(_)) => {
            let (x, y) = (as_float(a, name)?, as_float(b, name)?);
            Ok(Value::Float(match name {
                "plus" => x + y,
                "minus" => x - y,
                _ => x * y,
            }))
        }
        _ => {
            let x = to_decimal(a).ok_or_else(|| non_numeric(a, name))?;
            let y = to_decimal(b).ok_or_else(|| non_numeric(b, name))?;
            Ok(Value::Decimal(match name {
                "plus" => x + y,
                "minus" => x - y,
                _ => x * y,
            }))
        }
    }
}

fn as_float(v: &Value, name: &str) -> Result<f64, String> {
    match v {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        Value::Decimal(d) => d.to_f64().ok_or_else(|| non_numeric(v, name)),
        _ => Err(non_numeric(v, name)),
    }
}

fn non_numeric(v: &Value, name: &str) -> String {
    format!("{} requires numeric arguments, got {}", name, v.to_source())
}

fn sum(cols: &[Vec<Value>]) -> Result<Value, String> {
    let col = cols
        .first()
        .ok_or_else(|| "sum requires an input header".to_string())?;
    let mut acc = Value::Integer(0);
    for v in col {
        acc = apply(&acc, v, "plus")?;
    }
    Ok(acc)
}

fn extremum(
    cols: &[Vec<Value>],
    name: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, String> {
    let col = cols.first().ok_or_else(|| format!("{} requires an input header", name))?;
    let mut best: Option<&Value> = None;
    for v in col {
        best = match best {
            None => Some(v),
            Some(current) => {
                if accept(order(v, current)?) {
                    Some(v)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}
