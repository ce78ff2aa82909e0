use dawdle_lang::{Node, ParseError, parse};

fn items(source: &str) -> Vec<Node> {
    match parse(source).expect("source should parse") {
        Node::Section(items) => items,
        other => panic!("expected a section, got {:?}", other),
    }
}

fn parse_err(source: &str) -> ParseError {
    parse(source).expect_err("parsing should fail")
}

fn num(text: &str) -> Node {
    Node::Number(text.to_string())
}

fn header(name: &str) -> Node {
    Node::HeaderName(name.to_string())
}

#[test]
fn test_relation_literal_structure() {
    let items = items("| :a | :b |\n---\n| 1 | 2 |\n| 3 | 4 |\n");
    assert_eq!(
        items,
        vec![Node::RelationLiteral(vec![
            Node::RlHeaders(vec![header("a"), header("b")]),
            Node::RlRow(vec![num("1"), num("2")]),
            Node::RlRow(vec![num("3"), num("4")]),
        ])]
    );
}

#[test]
fn test_rule_line_is_optional() {
    let with_rule = items("| :a |\n---\n| 1 |\n");
    let without = items("| :a |\n| 1 |\n");
    assert_eq!(with_rule, without);
}

#[test]
fn test_let_declaration_structure() {
    let items = items("let nums\n    [1 2]\n| :a |\n| 1 |\n");
    assert_eq!(
        items[0],
        Node::Let(vec![
            Node::Var("nums".to_string()),
            Node::Section(vec![Node::Line(vec![Node::Set(vec![num("1"), num("2")])])]),
        ])
    );
}

#[test]
fn test_def_declaration_with_formals() {
    let items = items("def keep relation: cutoff\n    relation:\n| :a |\n| 1 |\n");
    match &items[0] {
        Node::Def(children) => {
            assert_eq!(children[0], Node::Var("keep".to_string()));
            assert_eq!(children[1], Node::RelationName("relation".to_string()));
            assert_eq!(children[2], Node::Var("cutoff".to_string()));
            assert!(matches!(children[3], Node::Section(_)));
        }
        other => panic!("expected a def, got {:?}", other),
    }
}

#[test]
fn test_word_operator_promoted_only_at_line_head() {
    let items = items("| :a |\n| 1 |\nv :a\n> eq :a v\n");
    assert_eq!(
        items[1],
        Node::Line(vec![Node::Operator("v".to_string()), header("a")])
    );
    // the same word in argument position stays an identifier
    assert_eq!(
        items[2],
        Node::Line(vec![
            Node::Operator(">".to_string()),
            Node::Var("eq".to_string()),
            header("a"),
            Node::Var("v".to_string()),
        ])
    );
}

#[test]
fn test_symbol_operators() {
    let items = items("| :a |\n| 1 |\n> gt :a 0\n^ :b plus :a 1\n- other:\n");
    for (item, symbol) in items[1..].iter().zip([">", "^", "-"]) {
        match item {
            Node::Line(children) => {
                assert_eq!(children[0], Node::Operator(symbol.to_string()));
            }
            other => panic!("expected a line, got {:?}", other),
        }
    }
}

#[test]
fn test_group_with_aggregator_block() {
    let items = items("| :k | :v |\n| 1 | 2 |\nG :k\n    :n count :v\n");
    match &items[1] {
        Node::Line(children) => {
            assert_eq!(children[0], Node::Operator("G".to_string()));
            assert_eq!(children[1], header("k"));
            assert_eq!(
                children[2],
                Node::Section(vec![Node::Aggregator(vec![
                    header("n"),
                    Node::Var("count".to_string()),
                    header("v"),
                ])])
            );
        }
        other => panic!("expected a line, got {:?}", other),
    }
}

#[test]
fn test_trailing_section_attaches_to_line() {
    let items = items("| :a |\n| 1 |\nU\n    | :a |\n    | 2 |\n");
    match &items[1] {
        Node::Line(children) => {
            assert_eq!(children.len(), 2);
            assert_eq!(children[0], Node::Operator("U".to_string()));
            assert!(matches!(children[1], Node::Section(_)));
        }
        other => panic!("expected a line, got {:?}", other),
    }
}

#[test]
fn test_set_members_can_be_mixed() {
    let items = items("[1 \"two\" :three]\n");
    assert_eq!(
        items,
        vec![Node::Line(vec![Node::Set(vec![
            num("1"),
            Node::Str("two".to_string()),
            header("three"),
        ])])]
    );
}

#[test]
fn test_relation_and_all_headers_references() {
    let plain = items("r:\nv :a\n");
    assert_eq!(
        plain[0],
        Node::Line(vec![Node::RelationName("r".to_string())])
    );

    let all = items("r:*\nU [1]\n");
    assert_eq!(all[0], Node::Line(vec![Node::AllHeaders("r".to_string())]));
}

#[test]
fn test_named_value_argument() {
    let items = items("| :a |\n| \"x\" |\n> like :a pattern=\"^x\"\n");
    match &items[1] {
        Node::Line(children) => {
            assert_eq!(
                children[3],
                Node::NamedValue(vec![
                    Node::Var("pattern".to_string()),
                    Node::Str("^x".to_string()),
                ])
            );
        }
        other => panic!("expected a line, got {:?}", other),
    }
}

#[test]
fn test_decimal_and_datetime_payloads_keep_text() {
    let items = items("| :p | :d |\n| $12.50 | ~2020-11-27T14:30:00 |\n");
    match &items[0] {
        Node::RelationLiteral(children) => {
            assert_eq!(
                children[1],
                Node::RlRow(vec![
                    Node::Decimal("12.50".to_string()),
                    Node::DateTime("2020-11-27T14:30:00".to_string()),
                ])
            );
        }
        other => panic!("expected a relation literal, got {:?}", other),
    }
}

#[test]
fn test_negative_numbers_and_decimals() {
    let items = items("[-3 $-1.5]\n");
    assert_eq!(
        items,
        vec![Node::Line(vec![Node::Set(vec![
            num("-3"),
            Node::Decimal("-1.5".to_string()),
        ])])]
    );
}

#[test]
fn test_map_macro_structure() {
    let items = items("| :x |\n| 1 |\n(map hs) `^ {{_}} plus :x 1`\n");
    assert_eq!(
        items[1],
        Node::MapMacro(vec![
            Node::Var("hs".to_string()),
            Node::Template("^ {{_}} plus :x 1".to_string()),
        ])
    );
}

#[test]
fn test_string_escapes_are_decoded() {
    let items = items("[\"a\\\"b\\n\"]\n");
    assert_eq!(
        items,
        vec![Node::Line(vec![Node::Set(vec![Node::Str(
            "a\"b\n".to_string()
        )])])]
    );
}

#[test]
fn test_blank_lines_are_ignored() {
    let with_blanks = items("| :a |\n| 1 |\n\nv :a\n\n");
    let without = items("| :a |\n| 1 |\nv :a\n");
    assert_eq!(with_blanks, without);
}

#[test]
fn test_ragged_indentation_is_rejected() {
    let err = parse_err("let x\n   [1]\n");
    assert_eq!(err, ParseError::MalformedIndentation { line: 2 });
}

#[test]
fn test_tab_indentation_is_rejected() {
    let err = parse_err("let x\n\t[1]\n");
    assert_eq!(err, ParseError::MalformedIndentation { line: 2 });
}

#[test]
fn test_unterminated_string() {
    assert!(matches!(
        parse_err("[\"oops]\n"),
        ParseError::UnterminatedString { .. }
    ));
}

#[test]
fn test_unterminated_template() {
    assert!(matches!(
        parse_err("| :x |\n| 1 |\n(map hs) `broken\n"),
        ParseError::UnterminatedTemplate { .. }
    ));
}

#[test]
fn test_empty_source_is_an_empty_section() {
    assert!(matches!(parse_err(""), ParseError::EmptySection { .. }));
    assert!(matches!(parse_err("\n\n"), ParseError::EmptySection { .. }));
}

#[test]
fn test_malformed_relation_rows() {
    assert!(matches!(
        parse_err("| :a | :b |\n| 1 2 |\n"),
        ParseError::MalformedRow { .. }
    ));
    assert!(matches!(
        parse_err("| :a |  |\n| 1 | 2 |\n"),
        ParseError::MalformedRow { .. }
    ));
}

#[test]
fn test_invalid_datetime_is_rejected_at_lex_time() {
    assert!(matches!(
        parse_err("[~2020-13-45]\n"),
        ParseError::UnexpectedToken { .. }
    ));
}

#[test]
fn test_declaration_requires_indented_body() {
    assert!(matches!(
        parse_err("let x\n| :a |\n| 1 |\n"),
        ParseError::UnexpectedToken { .. }
    ));
}
