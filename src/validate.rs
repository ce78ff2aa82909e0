//! Per-operator invariant checks, run before any rows are touched.
//!
//! Each validator inspects only header sets and argument shapes; the
//! relational operations in [`relation`](crate::relation) may then
//! assume their schema preconditions hold. Set-typed operands have no
//! headers, so their operators are checked structurally by the
//! compiler instead.

use crate::compiler::CompileError;
use crate::env::{FunctionKind, StdFunction};
use crate::relation::{AggSpec, CellArg, Relation};

/// filter: the function must be a filter function and every header
/// argument must exist on the relation.
pub fn filter(rel: &Relation, func: &StdFunction, args: &[CellArg]) -> Result<(), CompileError> {
    if !matches!(func.kind, FunctionKind::Filter(_)) {
        return Err(CompileError::TypeMismatch {
            expected: "a filter function".to_string(),
            found: format!("{} function `{}`", func.kind.name(), func.name),
        });
    }
    headers_present(rel, args)
}

/// select: the requested headers must be a duplicate-free subset of
/// the current ones.
pub fn select(rel: &Relation, headers: &[String]) -> Result<(), CompileError> {
    for (i, h) in headers.iter().enumerate() {
        if headers[..i].contains(h) {
            return Err(CompileError::NotUnique { header: h.clone() });
        }
    }
    let missing: Vec<String> = headers
        .iter()
        .filter(|h| !rel.headers.contains(h))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CompileError::Select {
            requested: headers.to_vec(),
            available: rel.headers.clone(),
        });
    }
    Ok(())
}

/// extend: the function must be an extend function and every header
/// argument must exist.
pub fn extend(rel: &Relation, func: &StdFunction, args: &[CellArg]) -> Result<(), CompileError> {
    if !matches!(func.kind, FunctionKind::Extend(_)) {
        return Err(CompileError::TypeMismatch {
            expected: "an extend function".to_string(),
            found: format!("{} function `{}`", func.kind.name(), func.name),
        });
    }
    headers_present(rel, args)
}

/// cross: the two header sets must be disjoint.
pub fn cross(left: &Relation, right: &Relation) -> Result<(), CompileError> {
    let overlap = left.headers.iter().any(|h| right.headers.contains(h));
    if overlap {
        return Err(CompileError::Cross {
            left: left.headers.clone(),
            right: right.headers.clone(),
        });
    }
    Ok(())
}

/// union/difference: the two header sets must be equal as sets.
pub fn union_or_difference(left: &Relation, right: &Relation) -> Result<(), CompileError> {
    let equal = left.headers.len() == right.headers.len()
        && left.headers.iter().all(|h| right.headers.contains(h));
    if !equal {
        return Err(CompileError::UnionOrDifference {
            left: left.headers.clone(),
            right: right.headers.clone(),
        });
    }
    Ok(())
}

/// join: the two header sets must share at least one header.
pub fn join(left: &Relation, right: &Relation) -> Result<(), CompileError> {
    let shared = left.headers.iter().any(|h| right.headers.contains(h));
    if !shared {
        return Err(CompileError::Join {
            left: left.headers.clone(),
            right: right.headers.clone(),
        });
    }
    Ok(())
}

/// group: group-by headers and aggregator input headers must exist,
/// aggregator functions must be aggregates, no aggregator output
/// header may coincide with a group-by header, and the output schema
/// (group-by headers then aggregator outputs) must be duplicate-free.
pub fn group(rel: &Relation, group_by: &[String], aggs: &[AggSpec]) -> Result<(), CompileError> {
    for (i, h) in group_by.iter().enumerate() {
        if group_by[..i].contains(h) {
            return Err(CompileError::NotUnique { header: h.clone() });
        }
    }
    for (i, agg) in aggs.iter().enumerate() {
        if aggs[..i].iter().any(|a| a.out == agg.out) {
            return Err(CompileError::NotUnique {
                header: agg.out.clone(),
            });
        }
    }

    let missing: Vec<String> = group_by
        .iter()
        .chain(aggs.iter().flat_map(|a| a.inputs.iter()))
        .filter(|h| !rel.headers.contains(*h))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CompileError::MissingHeaders {
            requested: missing,
            available: rel.headers.clone(),
        });
    }

    let colliding: Vec<String> = aggs
        .iter()
        .map(|a| a.out.clone())
        .filter(|out| group_by.contains(out))
        .collect();
    if !colliding.is_empty() {
        return Err(CompileError::Group { colliding });
    }

    for agg in aggs {
        if !matches!(agg.func.kind, FunctionKind::Aggregate(_)) {
            return Err(CompileError::TypeMismatch {
                expected: "an aggregate function".to_string(),
                found: format!("{} function `{}`", agg.func.kind.name(), agg.func.name),
            });
        }
    }
    Ok(())
}

fn headers_present(rel: &Relation, args: &[CellArg]) -> Result<(), CompileError> {
    let missing: Vec<String> = args
        .iter()
        .filter_map(|arg| match arg {
            CellArg::Header(h) if !rel.headers.contains(h) => Some(h.clone()),
            _ => None,
        })
        .collect();
    if !missing.is_empty() {
        return Err(CompileError::MissingHeaders {
            requested: missing,
            available: rel.headers.clone(),
        });
    }
    Ok(())
}
