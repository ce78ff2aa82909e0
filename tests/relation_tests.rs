use std::sync::Arc;

use dawdle_lang::env::StdFunction;
use dawdle_lang::relation::{self, AggSpec, CellArg, Relation};
use dawdle_lang::validate;
use dawdle_lang::{CompileError, Value};

fn rel(headers: &[&str], rows: Vec<Vec<Value>>) -> Relation {
    Relation::new(headers.iter().map(|h| h.to_string()).collect(), rows).unwrap()
}

fn int(n: i64) -> Value {
    Value::Integer(n)
}

fn positive_filter() -> StdFunction {
    StdFunction::filter(
        "positive",
        Arc::new(|values| match values.first() {
            Some(Value::Integer(n)) => Ok(Value::Boolean(*n > 0)),
            _ => Err("expected an integer".to_string()),
        }),
    )
}

fn double_extend() -> StdFunction {
    StdFunction::extend(
        "double",
        Arc::new(|values| match values.first() {
            Some(Value::Integer(n)) => Ok(Value::Integer(n * 2)),
            _ => Err("expected an integer".to_string()),
        }),
    )
}

fn count_aggregate() -> StdFunction {
    StdFunction::aggregate(
        "count",
        Arc::new(|cols| {
            let col = cols.first().ok_or_else(|| "no input column".to_string())?;
            Ok(Value::Integer(col.len() as i64))
        }),
    )
}

#[test]
fn test_new_rejects_duplicate_headers() {
    let err = Relation::new(vec!["a".into(), "a".into()], vec![]).unwrap_err();
    assert!(matches!(err, CompileError::NotUnique { header } if header == "a"));
}

#[test]
fn test_new_rejects_ragged_rows() {
    let err = Relation::new(vec!["a".into(), "b".into()], vec![vec![int(1)]]).unwrap_err();
    assert!(matches!(err, CompileError::RowNotSameLengthAsHeaders { .. }));
}

#[test]
fn test_filter_keeps_truthy_rows() {
    let r = rel(&["n"], vec![vec![int(-1)], vec![int(2)], vec![int(0)]]);
    let args = [CellArg::Header("n".to_string())];
    let filtered = relation::filter(&r, &positive_filter(), &args).unwrap();
    assert_eq!(filtered.rows, vec![vec![int(2)]]);
}

#[test]
fn test_filter_unknown_header_argument() {
    let r = rel(&["n"], vec![vec![int(1)]]);
    let args = [CellArg::Header("missing".to_string())];
    let err = relation::filter(&r, &positive_filter(), &args).unwrap_err();
    assert!(matches!(err, CompileError::MissingHeaders { .. }));
}

#[test]
fn test_select_reorders_columns() {
    let r = rel(&["a", "b"], vec![vec![int(1), int(2)]]);
    let selected = relation::select(&r, &["b".to_string(), "a".to_string()]);
    assert_eq!(selected.headers, vec!["b", "a"]);
    assert_eq!(selected.rows, vec![vec![int(2), int(1)]]);
}

#[test]
fn test_select_validator_requires_subset() {
    let r = rel(&["a"], vec![]);
    let err = validate::select(&r, &["a".to_string(), "z".to_string()]).unwrap_err();
    assert!(matches!(err, CompileError::Select { .. }));
}

#[test]
fn test_select_validator_rejects_duplicates() {
    let r = rel(&["a", "b"], vec![]);
    let err = validate::select(&r, &["a".to_string(), "a".to_string()]).unwrap_err();
    assert!(matches!(err, CompileError::NotUnique { header } if header == "a"));
}

#[test]
fn test_extend_appends_computed_column() {
    let r = rel(&["n"], vec![vec![int(3)]]);
    let args = [CellArg::Header("n".to_string())];
    let extended = relation::extend(&r, "twice", &double_extend(), &args).unwrap();
    assert_eq!(extended.headers, vec!["n", "twice"]);
    assert_eq!(extended.rows, vec![vec![int(3), int(6)]]);
}

#[test]
fn test_extend_replaces_existing_column() {
    let r = rel(&["n", "m"], vec![vec![int(3), int(9)]]);
    let args = [CellArg::Header("m".to_string())];
    let extended = relation::extend(&r, "n", &double_extend(), &args).unwrap();
    assert_eq!(extended.headers, vec!["m", "n"]);
    assert_eq!(extended.rows, vec![vec![int(9), int(18)]]);
}

#[test]
fn test_cross_row_count_is_product() {
    let left = rel(&["a"], vec![vec![int(1)], vec![int(2)]]);
    let right = rel(&["b"], vec![vec![int(3)], vec![int(4)], vec![int(5)]]);
    let crossed = relation::cross(&left, &right);
    assert_eq!(crossed.headers, vec!["a", "b"]);
    assert_eq!(crossed.rows.len(), 6);
}

#[test]
fn test_cross_validator_requires_disjoint_headers() {
    let left = rel(&["a", "b"], vec![]);
    let right = rel(&["b", "c"], vec![]);
    assert!(matches!(
        validate::cross(&left, &right).unwrap_err(),
        CompileError::Cross { .. }
    ));
}

#[test]
fn test_union_with_itself_is_identity() {
    let r = rel(&["a", "b"], vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
    let unioned = relation::union(&r, &r);
    assert_eq!(unioned, r);
}

#[test]
fn test_union_aligns_right_columns() {
    let left = rel(&["a", "b"], vec![vec![int(1), int(2)]]);
    let right = rel(&["b", "a"], vec![vec![int(2), int(1)], vec![int(4), int(3)]]);
    let unioned = relation::union(&left, &right);
    assert_eq!(unioned.headers, vec!["a", "b"]);
    // [1, 2] matches the aligned right row, so only one new tuple lands
    assert_eq!(unioned.rows, vec![vec![int(1), int(2)], vec![int(3), int(4)]]);
}

#[test]
fn test_difference_with_itself_is_empty() {
    let r = rel(&["a"], vec![vec![int(1)], vec![int(2)]]);
    let diffed = relation::difference(&r, &r);
    assert_eq!(diffed.headers, vec!["a"]);
    assert!(diffed.rows.is_empty());
}

#[test]
fn test_union_validator_requires_equal_header_sets() {
    let left = rel(&["a"], vec![]);
    let right = rel(&["a", "b"], vec![]);
    assert!(matches!(
        validate::union_or_difference(&left, &right).unwrap_err(),
        CompileError::UnionOrDifference { .. }
    ));
}

#[test]
fn test_join_headers_are_left_plus_right_only() {
    let left = rel(&["id", "l"], vec![vec![int(1), int(10)]]);
    let right = rel(&["id", "r"], vec![vec![int(1), int(20)]]);
    let joined = relation::join(&left, &right);
    assert_eq!(joined.headers, vec!["id", "l", "r"]);
    assert_eq!(joined.rows, vec![vec![int(1), int(10), int(20)]]);
}

#[test]
fn test_join_drops_unmatched_rows() {
    let left = rel(&["id"], vec![vec![int(1)], vec![int(2)]]);
    let right = rel(&["id", "r"], vec![vec![int(1), int(20)]]);
    let joined = relation::join(&left, &right);
    assert_eq!(joined.rows, vec![vec![int(1), int(20)]]);
}

#[test]
fn test_join_validator_requires_shared_header() {
    let left = rel(&["a"], vec![]);
    let right = rel(&["b"], vec![]);
    assert!(matches!(
        validate::join(&left, &right).unwrap_err(),
        CompileError::Join { .. }
    ));
}

#[test]
fn test_group_partitions_in_first_seen_order() {
    let r = rel(
        &["k", "v"],
        vec![
            vec![int(2), int(1)],
            vec![int(1), int(2)],
            vec![int(2), int(3)],
        ],
    );
    let aggs = [AggSpec {
        out: "n".to_string(),
        func: count_aggregate(),
        inputs: vec!["v".to_string()],
    }];
    let grouped = relation::group(&r, &["k".to_string()], &aggs).unwrap();
    assert_eq!(grouped.headers, vec!["k", "n"]);
    assert_eq!(grouped.rows, vec![vec![int(2), int(2)], vec![int(1), int(1)]]);
}

#[test]
fn test_group_validator_rejects_output_collision() {
    let r = rel(&["k", "v"], vec![]);
    let aggs = [AggSpec {
        out: "k".to_string(),
        func: count_aggregate(),
        inputs: vec!["v".to_string()],
    }];
    let err = validate::group(&r, &["k".to_string()], &aggs).unwrap_err();
    assert!(matches!(err, CompileError::Group { colliding } if colliding == vec!["k"]));
}

#[test]
fn test_group_validator_rejects_duplicate_outputs() {
    let r = rel(&["k", "v"], vec![]);
    let aggs = [
        AggSpec {
            out: "m".to_string(),
            func: count_aggregate(),
            inputs: vec!["v".to_string()],
        },
        AggSpec {
            out: "m".to_string(),
            func: count_aggregate(),
            inputs: vec!["v".to_string()],
        },
    ];
    let err = validate::group(&r, &["k".to_string()], &aggs).unwrap_err();
    assert!(matches!(err, CompileError::NotUnique { header } if header == "m"));
}

#[test]
fn test_group_validator_rejects_wrong_function_kind() {
    let r = rel(&["k", "v"], vec![]);
    let aggs = [AggSpec {
        out: "n".to_string(),
        func: double_extend(),
        inputs: vec!["v".to_string()],
    }];
    assert!(matches!(
        validate::group(&r, &["k".to_string()], &aggs).unwrap_err(),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn test_set_union_deduplicates() {
    let left = [int(1), int(2), int(2)];
    let right = [int(2), int(3)];
    assert_eq!(
        relation::set_union(&left, &right),
        vec![int(1), int(2), int(3)]
    );
}

#[test]
fn test_set_difference_preserves_left_order() {
    let left = [int(3), int(1), int(2)];
    let right = [int(1)];
    assert_eq!(relation::set_difference(&left, &right), vec![int(3), int(2)]);
}
