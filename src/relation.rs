//! The `Relation` value and the pure functions behind each built-in
//! operator. Nothing here touches the environment or the AST: inputs
//! arrive fully resolved, invariants are pre-checked by
//! [`validate`](crate::validate), and every function computes headers
//! and rows from scratch without mutating its operands.

use crate::compiler::CompileError;
use crate::env::{FunctionKind, StdFunction};
use crate::value::Value;

/// A schema plus a row set. Headers are unique; every row has exactly
/// one cell per header. Rows are conceptually unordered but kept in
/// first-seen order for deterministic output.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Relation {
    /// Build a relation, enforcing header uniqueness and row arity.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Relation, CompileError> {
        for (i, h) in headers.iter().enumerate() {
            if headers[..i].contains(h) {
                return Err(CompileError::NotUnique { header: h.clone() });
            }
        }
        for row in &rows {
            if row.len() != headers.len() {
                return Err(CompileError::RowNotSameLengthAsHeaders {
                    headers: headers.clone(),
                    row: row.iter().map(|v| v.to_source()).collect(),
                });
            }
        }
        Ok(Relation { headers, rows })
    }

    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// A per-row function argument: either a header (resolved against each
/// row) or a literal carried through unchanged.
#[derive(Debug, Clone)]
pub enum CellArg {
    Header(String),
    Lit(Value),
}

/// Keep rows for which the filter function returns a truthy value.
pub fn filter(
    rel: &Relation,
    func: &StdFunction,
    args: &[CellArg],
) -> Result<Relation, CompileError> {
    let callback = match &func.kind {
        FunctionKind::Filter(cb) => cb,
        other => {
            return Err(CompileError::TypeMismatch {
                expected: "a filter function".to_string(),
                found: format!("{} function `{}`", other.name(), func.name),
            });
        }
    };
    let indices = arg_indices(rel, args)?;

    let mut rows = Vec::new();
    for row in &rel.rows {
        let values = resolve_args(row, args, &indices);
        let keep = callback(&values).map_err(|message| CompileError::Function {
            name: func.name.clone(),
            message,
        })?;
        if keep.is_truthy() {
            rows.push(row.clone());
        }
    }
    Ok(Relation {
        headers: rel.headers.clone(),
        rows,
    })
}

/// Project to exactly the requested headers, in the requested order.
pub fn select(rel: &Relation, headers: &[String]) -> Relation {
    let indices: Vec<usize> = headers
        .iter()
        .filter_map(|h| rel.header_index(h))
        .collect();
    let rows = rel
        .rows
        .iter()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Relation {
        headers: headers.to_vec(),
        rows,
    }
}

/// Append a computed column. An existing column of the same name is
/// dropped first, so the new column always lands at the end.
pub fn extend(
    rel: &Relation,
    new_header: &str,
    func: &StdFunction,
    args: &[CellArg],
) -> Result<Relation, CompileError> {
    let callback = match &func.kind {
        FunctionKind::Extend(cb) => cb,
        other => {
            return Err(CompileError::TypeMismatch {
                expected: "an extend function".to_string(),
                found: format!("{} function `{}`", other.name(), func.name),
            });
        }
    };
    let indices = arg_indices(rel, args)?;
    let replaced = rel.header_index(new_header);

    let mut headers: Vec<String> = rel
        .headers
        .iter()
        .filter(|h| h.as_str() != new_header)
        .cloned()
        .collect();
    headers.push(new_header.to_string());

    let mut rows = Vec::new();
    for row in &rel.rows {
        let values = resolve_args(row, args, &indices);
        let computed = callback(&values).map_err(|message| CompileError::Function {
            name: func.name.clone(),
            message,
        })?;
        let mut new_row: Vec<Value> = row
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replaced)
            .map(|(_, v)| v.clone())
            .collect();
        new_row.push(computed);
        rows.push(new_row);
    }
    Ok(Relation { headers, rows })
}

/// Cartesian product; headers verified disjoint beforehand.
pub fn cross(left: &Relation, right: &Relation) -> Relation {
    let mut headers = left.headers.clone();
    headers.extend(right.headers.iter().cloned());

    let mut rows = Vec::new();
    for l in &left.rows {
        for r in &right.rows {
            let mut row = l.clone();
            row.extend(r.iter().cloned());
            rows.push(row);
        }
    }
    Relation { headers, rows }
}

/// Set union of row tuples; right rows are reordered into the left
/// header order before comparison.
pub fn union(left: &Relation, right: &Relation) -> Relation {
    let aligned = align(right, &left.headers);
    let mut rows = dedup_rows(&left.rows);
    for row in aligned {
        if !rows.contains(&row) {
            rows.push(row);
        }
    }
    Relation {
        headers: left.headers.clone(),
        rows,
    }
}

/// Row tuples of `left` not present in `right`.
pub fn difference(left: &Relation, right: &Relation) -> Relation {
    let aligned = align(right, &left.headers);
    let rows = dedup_rows(&left.rows)
        .into_iter()
        .filter(|row| !aligned.contains(row))
        .collect();
    Relation {
        headers: left.headers.clone(),
        rows,
    }
}

/// Natural inner join on the shared headers. Output headers are the
/// left headers followed by the right-only headers; shared headers
/// appear once, with values taken from the left side.
pub fn join(left: &Relation, right: &Relation) -> Relation {
    let shared: Vec<String> = left
        .headers
        .iter()
        .filter(|h| right.headers.contains(h))
        .cloned()
        .collect();
    let right_only: Vec<usize> = right
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !shared.contains(h))
        .map(|(i, _)| i)
        .collect();

    let mut headers = left.headers.clone();
    for &i in &right_only {
        headers.push(right.headers[i].clone());
    }

    let left_shared: Vec<usize> = shared
        .iter()
        .filter_map(|h| left.header_index(h))
        .collect();
    let right_shared: Vec<usize> = shared
        .iter()
        .filter_map(|h| right.header_index(h))
        .collect();

    let mut rows = Vec::new();
    for l in &left.rows {
        for r in &right.rows {
            let matches = left_shared
                .iter()
                .zip(&right_shared)
                .all(|(&li, &ri)| l[li] == r[ri]);
            if matches {
                let mut row = l.clone();
                for &i in &right_only {
                    row.push(r[i].clone());
                }
                rows.push(row);
            }
        }
    }
    Relation { headers, rows }
}

/// One aggregation applied per group: an output header, the aggregate
/// function, and the input headers whose columns it consumes.
pub struct AggSpec {
    pub out: String,
    pub func: StdFunction,
    pub inputs: Vec<String>,
}

/// Partition by the group-by tuple and evaluate each aggregator over
/// every partition. Output headers are the group-by headers followed
/// by the aggregator output headers; one row per distinct tuple, in
/// first-seen order.
pub fn group(
    rel: &Relation,
    group_by: &[String],
    aggs: &[AggSpec],
) -> Result<Relation, CompileError> {
    let key_indices: Vec<usize> = group_by
        .iter()
        .filter_map(|h| rel.header_index(h))
        .collect();

    let mut partitions: Vec<(Vec<Value>, Vec<&Vec<Value>>)> = Vec::new();
    for row in &rel.rows {
        let key: Vec<Value> = key_indices.iter().map(|&i| row[i].clone()).collect();
        match partitions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => partitions.push((key, vec![row])),
        }
    }

    let mut headers = group_by.to_vec();
    for agg in aggs {
        headers.push(agg.out.clone());
    }

    let mut rows = Vec::new();
    for (key, members) in &partitions {
        let mut row = key.clone();
        for agg in aggs {
            let callback = match &agg.func.kind {
                FunctionKind::Aggregate(cb) => cb,
                other => {
                    return Err(CompileError::TypeMismatch {
                        expected: "an aggregate function".to_string(),
                        found: format!("{} function `{}`", other.name(), agg.func.name),
                    });
                }
            };
            let columns: Vec<Vec<Value>> = agg
                .inputs
                .iter()
                .filter_map(|h| rel.header_index(h))
                .map(|i| members.iter().map(|m| m[i].clone()).collect())
                .collect();
            let value = callback(&columns).map_err(|message| CompileError::Function {
                name: agg.func.name.clone(),
                message,
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    Ok(Relation { headers, rows })
}

/// Deduplicated union of two literal sets, left order first.
pub fn set_union(left: &[Value], right: &[Value]) -> Vec<Value> {
    let mut out = dedup_values(left);
    for v in right {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

/// Members of `left` not present in `right`.
pub fn set_difference(left: &[Value], right: &[Value]) -> Vec<Value> {
    dedup_values(left)
        .into_iter()
        .filter(|v| !right.contains(v))
        .collect()
}

fn dedup_values(values: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn dedup_rows(rows: &[Vec<Value>]) -> Vec<Vec<Value>> {
    let mut out: Vec<Vec<Value>> = Vec::new();
    for row in rows {
        if !out.contains(row) {
            out.push(row.clone());
        }
    }
    out
}

/// Reorder `rel`'s rows into the given header order (headers verified
/// equal as sets by the union/difference validator).
fn align(rel: &Relation, headers: &[String]) -> Vec<Vec<Value>> {
    if rel.headers == headers {
        return dedup_rows(&rel.rows);
    }
    let indices: Vec<usize> = headers
        .iter()
        .filter_map(|h| rel.header_index(h))
        .collect();
    dedup_rows(
        &rel.rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect::<Vec<_>>(),
    )
}

/// Pre-compute the column index of every header argument, failing on
/// headers the relation does not have.
fn arg_indices(rel: &Relation, args: &[CellArg]) -> Result<Vec<Option<usize>>, CompileError> {
    args.iter()
        .map(|arg| match arg {
            CellArg::Header(h) => match rel.header_index(h) {
                Some(i) => Ok(Some(i)),
                None => Err(CompileError::MissingHeaders {
                    requested: vec![h.clone()],
                    available: rel.headers.clone(),
                }),
            },
            CellArg::Lit(_) => Ok(None),
        })
        .collect()
}

fn resolve_args(row: &[Value], args: &[CellArg], indices: &[Option<usize>]) -> Vec<Value> {
    args.iter()
        .zip(indices)
        .map(|(arg, idx)| match (arg, idx) {
            (CellArg::Header(_), Some(i)) => row[*i].clone(),
            (CellArg::Lit(v), _) => v.clone(),
            (CellArg::Header(_), None) => Value::Null,
        })
        .collect()
}
