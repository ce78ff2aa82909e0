//! AST-to-source rendering, the inverse of parsing.
//!
//! Used by display surfaces only; the compiler never calls this.
//! Indentation is re-derived from nesting depth, and relation literals
//! are rendered as aligned pipe tables with column widths computed per
//! literal. Round-trip guarantee: re-parsing the rendered text yields
//! a structurally equal tree, though the layout may differ from the
//! original source.

use crate::ast::node::Node;

/// Render a section (or any single node) back to source text.
pub fn serialize(node: &Node) -> String {
    match node {
        Node::Section(items) => {
            let mut lines = Vec::new();
            for item in items {
                render_item(item, 0, &mut lines);
            }
            let mut out = lines.join("\n");
            out.push('\n');
            out
        }
        other => value_text(other),
    }
}

fn render_item(node: &Node, depth: usize, out: &mut Vec<String>) {
    match node {
        Node::Let(children) => {
            let name = children.first().map(value_text).unwrap_or_default();
            out.push(format!("{}let {}", indent(depth), name));
            if let Some(body) = children.last() {
                render_section(body, depth + 1, out);
            }
        }
        Node::Def(children) => {
            let head: Vec<String> = children[..children.len().saturating_sub(1)]
                .iter()
                .map(value_text)
                .collect();
            out.push(format!("{}def {}", indent(depth), head.join(" ")));
            if let Some(body) = children.last() {
                render_section(body, depth + 1, out);
            }
        }
        Node::Line(children) => {
            let (trailing, tokens) = match children.split_last() {
                Some((section @ Node::Section(_), rest)) => (Some(section), rest),
                _ => (None, children.as_slice()),
            };
            let text: Vec<String> = tokens.iter().map(value_text).collect();
            out.push(format!("{}{}", indent(depth), text.join(" ")));
            if let Some(section) = trailing {
                render_section(section, depth + 1, out);
            }
        }
        Node::Aggregator(children) => {
            let text: Vec<String> = children.iter().map(value_text).collect();
            out.push(format!("{}{}", indent(depth), text.join(" ")));
        }
        Node::MapMacro(children) => {
            let value = children.first().map(value_text).unwrap_or_default();
            let template = match children.last() {
                Some(Node::Template(t)) => t.clone(),
                _ => String::new(),
            };
            out.push(format!("{}(map {}) `{}`", indent(depth), value, template));
        }
        Node::RelationLiteral(children) => render_table(children, depth, out),
        Node::Section(items) => {
            for item in items {
                render_item(item, depth, out);
            }
        }
        other => out.push(format!("{}{}", indent(depth), value_text(other))),
    }
}

fn render_section(node: &Node, depth: usize, out: &mut Vec<String>) {
    if let Node::Section(items) = node {
        for item in items {
            render_item(item, depth, out);
        }
    }
}

/// Aligned pipe table: every column padded to its widest cell, with a
/// rule line between the header row and the data rows.
fn render_table(children: &[Node], depth: usize, out: &mut Vec<String>) {
    let mut grid: Vec<Vec<String>> = Vec::new();
    for child in children {
        match child {
            Node::RlHeaders(cells) | Node::RlRow(cells) => {
                grid.push(cells.iter().map(value_text).collect());
            }
            _ => {}
        }
    }
    if grid.is_empty() {
        return;
    }

    let columns = grid.iter().map(|row| row.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            grid.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.len())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |row: &[String]| -> String {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, cell)| format!(" {:<width$} ", cell, width = widths[c]))
            .collect();
        format!("{}|{}|", indent(depth), cells.join("|"))
    };

    out.push(render_row(&grid[0]));
    if grid.len() > 1 {
        let total: usize = widths.iter().map(|w| w + 2).sum::<usize>() + columns + 1;
        out.push(format!("{}{}", indent(depth), "-".repeat(total.max(3))));
        for row in &grid[1..] {
            out.push(render_row(row));
        }
    }
}

/// One value token in source form.
fn value_text(node: &Node) -> String {
    match node {
        Node::Number(t) => t.clone(),
        Node::Str(s) => format!("\"{}\"", escape(s)),
        Node::Bool(t) => t.clone(),
        Node::Null => "null".to_string(),
        Node::Decimal(t) => format!("${}", t),
        Node::DateTime(t) => format!("~{}", t),
        Node::Template(t) => format!("`{}`", t),
        Node::Var(n) => n.clone(),
        Node::RelationName(n) => format!("{}:", n),
        Node::HeaderName(n) => format!(":{}", n),
        Node::AllHeaders(n) => format!("{}:*", n),
        Node::Operator(sym) => sym.clone(),
        Node::Set(members) => {
            let inner: Vec<String> = members.iter().map(value_text).collect();
            format!("[{}]", inner.join(" "))
        }
        Node::NamedValue(children) => match children.as_slice() {
            [Node::Var(name), value] => format!("{}={}", name, value_text(value)),
            _ => String::new(),
        },
        // composite constructs are rendered by render_item
        _ => String::new(),
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

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}
