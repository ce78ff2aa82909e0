use dawdle_lang::{
    CompileError, Compiled, CompiledSection, Compiler, Relation, Value, parse, standard_env,
};

fn compile_src(source: &str) -> Result<CompiledSection, String> {
    let ast = parse(source).map_err(|e| format!("{}", e))?;
    let mut compiler = Compiler::new();
    compiler
        .compile(&standard_env(), &ast)
        .map_err(|e| format!("{}", e))
}

fn compile_err(source: &str) -> CompileError {
    let ast = parse(source).expect("source should parse");
    let mut compiler = Compiler::new();
    compiler
        .compile(&standard_env(), &ast)
        .expect_err("compilation should fail")
}

fn relation(result: &CompiledSection) -> &Relation {
    match &result.result {
        Compiled::Relation(rel) => rel,
        other => panic!("expected a relation, got {}", other.type_name()),
    }
}

fn int(n: i64) -> Value {
    Value::Integer(n)
}

#[test]
fn test_relation_literal_fidelity() {
    let result = compile_src("| :a | :b |\n---\n| 1 | 2 |\n").unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["a", "b"]);
    assert_eq!(rel.rows, vec![vec![int(1), int(2)]]);
}

#[test]
fn test_relation_literal_duplicate_header() {
    let err = compile_err("| :a | :a |\n| 1 | 2 |\n");
    assert!(matches!(err, CompileError::NotUnique { header } if header == "a"));
}

#[test]
fn test_relation_literal_row_arity() {
    let err = compile_err("| :a | :b |\n| 1 |\n");
    assert!(matches!(err, CompileError::RowNotSameLengthAsHeaders { .. }));
}

#[test]
fn test_filter_keeps_matching_rows() {
    let result = compile_src("| :a |\n| 1 |\n| 2 |\n| 3 |\n> gte :a 2\n").unwrap();
    assert_eq!(relation(&result).rows, vec![vec![int(2)], vec![int(3)]]);
}

#[test]
fn test_filter_eq_string() {
    let source = "| :name |\n| \"ada\" |\n| \"bob\" |\n> eq :name \"ada\"\n";
    let result = compile_src(source).unwrap();
    assert_eq!(
        relation(&result).rows,
        vec![vec![Value::String("ada".into())]]
    );
}

#[test]
fn test_filter_like_pattern() {
    let source = "| :name |\n| \"alpha\" |\n| \"beta\" |\n> like :name \"^a\"\n";
    let result = compile_src(source).unwrap();
    assert_eq!(relation(&result).rows.len(), 1);
}

#[test]
fn test_select_projects_in_requested_order() {
    let result = compile_src("| :a | :b |\n| 1 | 2 |\nv :b :a\n").unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["b", "a"]);
    assert_eq!(rel.rows, vec![vec![int(2), int(1)]]);
}

#[test]
fn test_select_rejects_unknown_header() {
    let err = compile_err("| :a |\n| 1 |\nv :missing\n");
    assert!(matches!(err, CompileError::Select { .. }));
}

#[test]
fn test_select_rejects_duplicate_headers() {
    let err = compile_err("| :a | :b |\n| 1 | 2 |\nv :a :a\n");
    assert!(matches!(err, CompileError::NotUnique { header } if header == "a"));
}

#[test]
fn test_select_all_headers_argument() {
    let source = "let r\n    | :a | :b |\n    | 1 | 2 |\nr:\nv r:*\n";
    let result = compile_src(source).unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["a", "b"]);
    assert_eq!(rel.rows, vec![vec![int(1), int(2)]]);
}

#[test]
fn test_select_from_header_set() {
    let source = "let cols\n    [:a]\n| :a | :b |\n| 1 | 2 |\nv cols\n";
    let result = compile_src(source).unwrap();
    assert_eq!(relation(&result).headers, vec!["a"]);
}

#[test]
fn test_extend_appends_column() {
    let result = compile_src("| :a |\n| 2 |\n^ :b times :a 10\n").unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["a", "b"]);
    assert_eq!(rel.rows, vec![vec![int(2), int(20)]]);
}

#[test]
fn test_extend_replaces_same_named_column() {
    let result = compile_src("| :a | :b |\n| 1 | 5 |\n^ :a plus :b 1\n").unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["b", "a"]);
    assert_eq!(rel.rows, vec![vec![int(5), int(6)]]);
}

#[test]
fn test_cross_is_cartesian_product() {
    let source = "let other\n    | :x |\n    | 7 |\n    | 8 |\n| :a |\n| 1 |\n| 2 |\nX other:\n";
    let result = compile_src(source).unwrap();
    let rel = relation(&result);
    assert_eq!(rel.headers, vec!["a", "x"]);
    assert_eq!(rel.rows.len(), 4);
}

#[test]
fn test_cross_rejects_shared_headers() {
    let source = "let other\n    | :a |\n    | 7 |\n| :a |\n| 1 |\nX other:\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::Cross { .. }));
}

#[test]
fn test_union_collapses_duplicates() {
    let source = "let other\n    | :a |\n    | 2 |\n    | 3 |\n| :a |\n| 1 |\n| 2 |\nU other:\n";
    let result = compile_src(source).unwrap();
    assert_eq!(
        relation(&result).rows,
        vec![vec![int(1)], vec![int(2)], vec![int(3)]]
    );
}

#[test]
fn test_union_requires_equal_headers() {
    let source = "let other\n    | :b |\n    | 2 |\n| :a |\n| 1 |\nU other:\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::UnionOrDifference { .. }));
}

#[test]
fn test_difference_removes_right_rows() {
    let source = "let other\n    | :a |\n    | 2 |\n| :a |\n| 1 |\n| 2 |\n- other:\n";
    let result = compile_src(source).unwrap();
    assert_eq!(relation(&result).rows, vec![vec![int(1)]]);
}

#[test]
fn test_join_scenario() {
    let source = concat!(
        "let right\n",
        "    | :right_id | :left_id | :r |\n",
        "    | 1 | 1 | 11 |\n",
        "    | 2 | 1 | 12 |\n",
        "    | 3 | 2 | 23 |\n",
        "| :left_id | :l |\n",
        "| 1 | 10 |\n",
        "| 2 | 20 |\n",
        "| 3 | 30 |\n",
        "J right:\n",
    );
    let result = compile_src(source).unwrap();
    let rel = relation(&result);

    assert_eq!(rel.headers, vec!["left_id", "l", "right_id", "r"]);
    assert_eq!(rel.rows.len(), 3);
    // inner join: no output row for left_id=3
    assert!(!rel.rows.iter().any(|row| row[0] == int(3)));
    // shared-header values line up
    assert!(rel.rows.contains(&vec![int(1), int(10), int(1), int(11)]));
    assert!(rel.rows.contains(&vec![int(1), int(10), int(2), int(12)]));
    assert!(rel.rows.contains(&vec![int(2), int(20), int(3), int(23)]));
}

#[test]
fn test_join_requires_shared_header() {
    let source = "let other\n    | :x |\n    | 1 |\n| :a |\n| 1 |\nJ other:\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::Join { .. }));
}

#[test]
fn test_group_aggregates_partitions() {
    let source = concat!(
        "| :dept | :amount |\n",
        "| \"a\" | 1 |\n",
        "| \"a\" | 2 |\n",
        "| \"b\" | 5 |\n",
        "G :dept\n",
        "    :total sum :amount\n",
        "    :n count :amount\n",
    );
    let result = compile_src(source).unwrap();
    let rel = relation(&result);

    assert_eq!(rel.headers, vec!["dept", "total", "n"]);
    assert_eq!(rel.rows.len(), 2);
    assert!(
        rel.rows
            .contains(&vec![Value::String("a".into()), int(3), int(2)])
    );
    assert!(
        rel.rows
            .contains(&vec![Value::String("b".into()), int(5), int(1)])
    );
}

#[test]
fn test_group_output_tuples_are_unique() {
    let source = concat!(
        "| :k | :v |\n",
        "| 1 | 1 |\n",
        "| 1 | 2 |\n",
        "| 2 | 3 |\n",
        "| 2 | 4 |\n",
        "G :k\n",
        "    :m max :v\n",
    );
    let result = compile_src(source).unwrap();
    let rel = relation(&result);
    let mut keys: Vec<&Value> = rel.rows.iter().map(|r| &r[0]).collect();
    let before = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), before);
    assert_eq!(rel.rows.len(), 2);
}

#[test]
fn test_group_rejects_colliding_output_header() {
    let source = "| :k | :v |\n| 1 | 2 |\nG :k\n    :k sum :v\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::Group { colliding } if colliding == vec!["k"]));
}

#[test]
fn test_group_rejects_duplicate_output_headers() {
    let source = "| :k | :v |\n| 1 | 2 |\nG :k\n    :m sum :v\n    :m max :v\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::NotUnique { header } if header == "m"));
}

#[test]
fn test_group_rejects_duplicate_group_by_headers() {
    let source = "| :k | :v |\n| 1 | 2 |\nG :k :k\n    :m sum :v\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::NotUnique { header } if header == "k"));
}

#[test]
fn test_integer_overflow_is_a_function_error() {
    let source = "| :a |\n| 9223372036854775807 |\n^ :b plus :a 1\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::Function { name, .. } if name == "plus"));
}

#[test]
fn test_undeclared_relation_is_scope_error() {
    let err = compile_err("| :a |\n| 1 |\nJ missing:\n");
    match err {
        CompileError::Scope { name, available } => {
            assert_eq!(name, "missing");
            assert!(available.contains(&"sum".to_string()));
        }
        other => panic!("expected a scope error, got {:?}", other),
    }
}

#[test]
fn test_declarations_must_precede_body() {
    let source = "| :a |\n| 1 |\nlet x\n    [1]\n";
    let err = compile_err(source);
    assert!(matches!(err, CompileError::SectionOrderIncorrect));
}

#[test]
fn test_first_item_must_be_relation_or_set() {
    let err = compile_err("> eq :a 1\n");
    assert!(matches!(err, CompileError::FirstNodeNotARelationOrSet));
}

#[test]
fn test_composite_operator_invocation() {
    let source = concat!(
        "def keep_small relation: cutoff\n",
        "    relation:\n",
        "    > lt :qty cutoff\n",
        "| :qty |\n",
        "| 1 |\n",
        "| 100 |\n",
        "keep_small 10\n",
    );
    let result = compile_src(source).unwrap();
    assert_eq!(relation(&result).rows, vec![vec![int(1)]]);
}

#[test]
fn test_composite_operator_arity_mismatch() {
    let source = concat!(
        "def keep_small relation: cutoff\n",
        "    relation:\n",
        "    > lt :qty cutoff\n",
        "| :qty |\n",
        "| 1 |\n",
        "keep_small 10 20\n",
    );
    let err = compile_err(source);
    assert!(matches!(
        err,
        CompileError::OperatorArgs {
            expected: 2,
            supplied: 3,
            ..
        }
    ));
}

#[test]
fn test_def_is_lexically_scoped() {
    // `cutoff` resolves where the def was declared, not at the call
    // site inside another def's scope
    let source = concat!(
        "let cutoff\n",
        "    [50]\n",
        "def keep relation:\n",
        "    relation:\n",
        "    > lt :qty cutoff\n",
        "| :qty |\n",
        "| 10 |\n",
        "| 90 |\n",
        "keep\n",
    );
    let result = compile_src(source).unwrap();
    assert_eq!(relation(&result).rows, vec![vec![int(10)]]);
}

#[test]
fn test_nested_section_as_final_argument() {
    let source = concat!(
        "| :a |\n",
        "| 1 |\n",
        "| 2 |\n",
        "U\n",
        "    | :a |\n",
        "    | 3 |\n",
    );
    let result = compile_src(source).unwrap();
    assert_eq!(
        relation(&result).rows,
        vec![vec![int(1)], vec![int(2)], vec![int(3)]]
    );
}

#[test]
fn test_macro_expands_to_chained_extends() {
    let source = concat!(
        "let headers\n",
        "    [:a :b]\n",
        "| :x |\n",
        "| 1 |\n",
        "(map headers) `^ {{_}} plus :x 1`\n",
    );
    let result = compile_src(source).unwrap();
    let rel = relation(&result);
    // two generated extend lines, applied left to right
    assert_eq!(rel.headers, vec!["x", "a", "b"]);
    assert_eq!(rel.rows, vec![vec![int(1), int(2), int(2)]]);
}

#[test]
fn test_macro_rejects_multi_line_expansion() {
    let source = concat!(
        "let members\n",
        "    [1]\n",
        "| :x |\n",
        "| 1 |\n",
        "(map members) `{{_}}`\n",
    );
    let err = compile_err(source);
    assert!(matches!(err, CompileError::MacroLineNotSingleLine { .. }));
}

#[test]
fn test_set_union_and_difference() {
    let result = compile_src("[1 2]\nU [2 3]\n- [1]\n").unwrap();
    match &result.result {
        Compiled::Set(members) => assert_eq!(members, &vec![int(2), int(3)]),
        other => panic!("expected a set, got {}", other.type_name()),
    }
}

#[test]
fn test_set_rejects_relational_operators() {
    let err = compile_err("[1 2]\nv :a\n");
    assert!(matches!(err, CompileError::SetOperatorUnsupported { .. }));
}

#[test]
fn test_all_headers_reference() {
    let source = "let r\n    | :a | :b |\n    | 1 | 2 |\nr:*\n";
    let result = compile_src(source).unwrap();
    match &result.result {
        Compiled::Headers(headers) => assert_eq!(headers, &vec!["a", "b"]),
        other => panic!("expected headers, got {}", other.type_name()),
    }
}

#[test]
fn test_decimal_and_datetime_literals() {
    let source = concat!(
        "| :price | :at |\n",
        "| $1.50 | ~2020-11-27 |\n",
        "| $2.50 | ~2020-11-28 |\n",
        "> gt :price $2.00\n",
    );
    let result = compile_src(source).unwrap();
    let rel = relation(&result);
    assert_eq!(rel.rows.len(), 1);
    assert!(matches!(rel.rows[0][0], Value::Decimal(_)));
    assert!(matches!(rel.rows[0][1], Value::DateTime(_)));
}

#[test]
fn test_line_results_annotate_each_step() {
    let result = compile_src("| :a |\n| 1 |\n| 2 |\n> gte :a 2\nv :a\n").unwrap();
    assert_eq!(result.line_results.len(), 3);
    match &result.line_results[0] {
        Compiled::Relation(rel) => assert_eq!(rel.rows.len(), 2),
        other => panic!("expected a relation, got {}", other.type_name()),
    }
}

#[test]
fn test_lets_to_env_registers_declarations_only() {
    let source = "let nums\n    [1 2]\n| :a |\n| 1 |\n";
    let ast = parse(source).unwrap();
    let mut compiler = Compiler::new();
    let env = compiler.lets_to_env(&standard_env(), &ast).unwrap();
    assert!(env.lookup("nums").is_some());

    // the body still compiles against the extended env
    let body = parse("nums:\nU [3]\n").unwrap();
    let result = compiler.compile(&env, &body).unwrap();
    match result.result {
        Compiled::Set(members) => assert_eq!(members, vec![int(1), int(2), int(3)]),
        other => panic!("expected a set, got {}", other.type_name()),
    }
}

#[test]
fn test_filter_function_must_be_registered() {
    let err = compile_err("| :a |\n| 1 |\n> nope :a 1\n");
    assert!(matches!(
        err,
        CompileError::Scope { .. } | CompileError::NotAFunction { .. }
    ));
}
