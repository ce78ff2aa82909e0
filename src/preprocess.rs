use crate::parser::ParseError;

/// Marker line opening a nested block.
pub const INDENT: &str = "<INDENT>";
/// Marker line closing a nested block.
pub const DEDENT: &str = "</INDENT>";

/// Rewrite significant-whitespace source into an explicit
/// block-delimited line stream.
///
/// Each non-blank line's indentation must be an exact multiple of four
/// spaces; its depth is the number of 4-space groups. When the depth
/// increases from one non-blank line to the next, an `<INDENT>` marker
/// line is emitted per level gained; when it decreases, a `</INDENT>`
/// per level lost. Open blocks are closed at end of input. Blank lines
/// pass through verbatim and do not affect depth tracking.
///
/// The indentation itself is stripped from the emitted lines: after
/// this pass the block structure is entirely explicit, so the grammar
/// never needs to look at raw whitespace.
pub fn preprocess(source: &str) -> Result<Vec<String>, ParseError> {
    let mut out = Vec::new();
    let mut depth = 0usize;

    for (idx, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            out.push(String::new());
            continue;
        }

        let new_depth = indent_depth(line, idx + 1)?;
        while depth < new_depth {
            out.push(INDENT.to_string());
            depth += 1;
        }
        while depth > new_depth {
            out.push(DEDENT.to_string());
            depth -= 1;
        }
        out.push(line[new_depth * 4..].to_string());
    }

    while depth > 0 {
        out.push(DEDENT.to_string());
        depth -= 1;
    }

    Ok(out)
}

/// Depth of a non-blank line, rejecting tabs and ragged indentation.
fn indent_depth(line: &str, line_no: usize) -> Result<usize, ParseError> {
    if line
        .chars()
        .take_while(|c| c.is_whitespace())
        .any(|c| c != ' ')
    {
        return Err(ParseError::MalformedIndentation { line: line_no });
    }
    let leading = line.len() - line.trim_start_matches(' ').len();
    if leading % 4 != 0 {
        return Err(ParseError::MalformedIndentation { line: line_no });
    }
    Ok(leading / 4)
}

#[test]
fn test_flat_lines_pass_through() {
    let out = preprocess("a:\n> eq :a 1\n").unwrap();
    assert_eq!(out, vec!["a:", "> eq :a 1"]);
}

#[test]
fn test_indent_markers() {
    let out = preprocess("let x\n    [1 2]\na:\n").unwrap();
    assert_eq!(out, vec!["let x", "<INDENT>", "[1 2]", "</INDENT>", "a:"]);
}

#[test]
fn test_trailing_blocks_closed_at_eof() {
    let out = preprocess("let x\n    let y\n        [1]\n").unwrap();
    assert_eq!(
        out,
        vec![
            "let x",
            "<INDENT>",
            "let y",
            "<INDENT>",
            "[1]",
            "</INDENT>",
            "</INDENT>",
        ]
    );
}

#[test]
fn test_blank_lines_preserved() {
    let out = preprocess("a:\n\n> eq :a 1\n").unwrap();
    assert_eq!(out, vec!["a:", "", "> eq :a 1"]);
}

#[test]
fn test_ragged_indentation_rejected() {
    let err = preprocess("let x\n  [1]\n").unwrap_err();
    assert!(matches!(err, ParseError::MalformedIndentation { line: 2 }));
}

#[test]
fn test_tab_indentation_rejected() {
    let err = preprocess("let x\n\t[1]\n").unwrap_err();
    assert!(matches!(err, ParseError::MalformedIndentation { line: 2 }));
}
