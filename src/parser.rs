use crate::ast::raw::{Raw, Rule};
use crate::preprocess::{DEDENT, INDENT, preprocess};

/// Errors produced while turning source text into a raw parse tree.
///
/// Parsing is fail-fast: the first malformed construct aborts the whole
/// compilation, no partial tree is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A line's indentation is not an exact multiple of four spaces
    MalformedIndentation { line: usize },

    /// String literal missing its closing quote
    UnterminatedString { line: usize },

    /// Template literal missing its closing backtick
    UnterminatedTemplate { line: usize },

    /// Any other token-level or structural mismatch
    UnexpectedToken {
        line: usize,
        found: String,
        expected: String,
    },

    /// An indented block contains no declarations or body items
    EmptySection { line: usize },

    /// A relation-literal row is not a well-formed pipe row
    MalformedRow { line: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedIndentation { line } => {
                write!(f, "line {}: indentation must be a multiple of 4 spaces", line)
            }
            ParseError::UnterminatedString { line } => {
                write!(f, "line {}: unterminated string literal", line)
            }
            ParseError::UnterminatedTemplate { line } => {
                write!(f, "line {}: unterminated template literal", line)
            }
            ParseError::UnexpectedToken {
                line,
                found,
                expected,
            } => {
                write!(f, "line {}: expected {}, found {}", line, expected, found)
            }
            ParseError::EmptySection { line } => {
                write!(f, "line {}: section has no content", line)
            }
            ParseError::MalformedRow { line } => {
                write!(f, "line {}: malformed relation-literal row", line)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Built-in operator words that double as identifiers everywhere except
/// the head of a line.
const WORD_OPERATORS: [&str; 5] = ["v", "X", "U", "J", "G"];

/// Recursive-descent parser over the preprocessed, marker-delimited
/// line stream. Produces the raw grammar-shaped tree; see
/// [`normalize`](crate::normalize::normalize) for the canonical form.
pub struct Parser {
    lines: Vec<String>,
    position: usize,
    src_line: usize,
}

impl Parser {
    pub fn new(lines: Vec<String>) -> Self {
        Parser {
            lines,
            position: 0,
            src_line: 0,
        }
    }

    /// Preprocess and wrap in one step.
    pub fn from_source(source: &str) -> Result<Self, ParseError> {
        Ok(Parser::new(preprocess(source)?))
    }

    fn peek(&self) -> Option<&str> {
        self.lines.get(self.position).map(|s| s.as_str())
    }

    fn advance(&mut self) -> Option<String> {
        let line = self.lines.get(self.position).cloned()?;
        self.position += 1;
        if line != INDENT && line != DEDENT {
            self.src_line += 1;
        }
        Some(line)
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(l) if l.trim().is_empty()) {
            self.advance();
        }
    }

    /// Parse the whole stream as one top-level section.
    pub fn parse_program(&mut self) -> Result<Raw, ParseError> {
        let section = self.parse_section()?;
        self.skip_blanks();
        if let Some(line) = self.peek() {
            return Err(ParseError::UnexpectedToken {
                line: self.src_line + 1,
                found: line.to_string(),
                expected: "end of input".to_string(),
            });
        }
        Ok(section)
    }

    /// `(let | def)* body_item+` up to the enclosing dedent.
    fn parse_section(&mut self) -> Result<Raw, ParseError> {
        let mut items = Vec::new();

        loop {
            self.skip_blanks();
            let line = match self.peek() {
                None => break,
                Some(DEDENT) => break,
                Some(l) => l,
            };

            if line == INDENT {
                return Err(ParseError::UnexpectedToken {
                    line: self.src_line + 1,
                    found: "indented block".to_string(),
                    expected: "a declaration or body line".to_string(),
                });
            }

            if first_word(line) == Some("let") {
                items.push(self.parse_let()?);
            } else if first_word(line) == Some("def") {
                items.push(self.parse_def()?);
            } else if line.trim_start().starts_with('|') {
                items.push(self.parse_relation_literal()?);
            } else {
                items.push(self.parse_line()?);
            }
        }

        if items.is_empty() {
            return Err(ParseError::EmptySection {
                line: self.src_line + 1,
            });
        }
        Ok(Raw::branch(Rule::Section, items))
    }

    fn parse_let(&mut self) -> Result<Raw, ParseError> {
        let text = self.advance().unwrap_or_default();
        let line_no = self.src_line;
        let rest = text.trim_start()["let".len()..].to_string();
        let tokens = lex_line(&rest, line_no)?;

        let name = match tokens.as_slice() {
            [tok] if inner_rule(tok) == Some(Rule::Var) => tok.clone(),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    line: line_no,
                    found: rest.trim().to_string(),
                    expected: "a single name after `let`".to_string(),
                });
            }
        };

        let body = self.parse_indented_section()?;
        Ok(Raw::branch(Rule::Let, vec![name, body]))
    }

    fn parse_def(&mut self) -> Result<Raw, ParseError> {
        let text = self.advance().unwrap_or_default();
        let line_no = self.src_line;
        let rest = text.trim_start()["def".len()..].to_string();
        let tokens = lex_line(&rest, line_no)?;

        let mut children = Vec::new();
        for (i, tok) in tokens.iter().enumerate() {
            match inner_rule(tok) {
                Some(Rule::Var) if i == 0 => children.push(tok.clone()),
                Some(Rule::Var) | Some(Rule::RelationName) if i > 0 => children.push(tok.clone()),
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        line: line_no,
                        found: rest.trim().to_string(),
                        expected: "an operator name and formal parameters after `def`"
                            .to_string(),
                    });
                }
            }
        }
        if children.is_empty() {
            return Err(ParseError::UnexpectedToken {
                line: line_no,
                found: "end of line".to_string(),
                expected: "an operator name after `def`".to_string(),
            });
        }

        children.push(self.parse_indented_section()?);
        Ok(Raw::branch(Rule::Def, children))
    }

    /// Consume the `<INDENT> section </INDENT>` block that must follow a
    /// declaration (or trail an operator line).
    fn parse_indented_section(&mut self) -> Result<Raw, ParseError> {
        self.skip_blanks();
        if self.peek() != Some(INDENT) {
            return Err(ParseError::UnexpectedToken {
                line: self.src_line + 1,
                found: self.peek().unwrap_or("end of input").to_string(),
                expected: "an indented block".to_string(),
            });
        }
        self.advance();
        let section = self.parse_section()?;
        // the preprocessor always balances markers
        if self.peek() == Some(DEDENT) {
            self.advance();
        }
        Ok(section)
    }

    fn parse_relation_literal(&mut self) -> Result<Raw, ParseError> {
        let header_text = self.advance().unwrap_or_default();
        let line_no = self.src_line;

        let mut headers = Vec::new();
        for cell in split_cells(&header_text, line_no)? {
            let tok = lex_single(&cell, line_no)?;
            if inner_rule(&tok) != Some(Rule::HeaderName) {
                return Err(ParseError::UnexpectedToken {
                    line: line_no,
                    found: cell,
                    expected: "a :header name".to_string(),
                });
            }
            headers.push(tok);
        }
        let mut children = vec![Raw::branch(Rule::RlHeaders, headers)];

        loop {
            match self.peek() {
                Some(l) if is_rule_line(l) => {
                    self.advance();
                }
                Some(l) if l.trim_start().starts_with('|') => {
                    let text = self.advance().unwrap_or_default();
                    let row_no = self.src_line;
                    let mut cells = Vec::new();
                    for cell in split_cells(&text, row_no)? {
                        cells.push(lex_single(&cell, row_no)?);
                    }
                    children.push(Raw::branch(Rule::RlRow, cells));
                }
                _ => break,
            }
        }

        Ok(Raw::branch(Rule::RelationLiteral, children))
    }

    fn parse_line(&mut self) -> Result<Raw, ParseError> {
        let text = self.advance().unwrap_or_default();
        let line_no = self.src_line;
        let trimmed = text.trim();

        if trimmed.starts_with("(map") {
            return parse_map_macro(trimmed, line_no);
        }

        let mut tokens = lex_line(trimmed, line_no)?;

        // A leading word operator is only an operator at the head of a
        // line; everywhere else `v`, `X`, `U`, `J`, `G` are identifiers.
        if let Some(first) = tokens.first() {
            if let Some(word) = var_text(first) {
                if WORD_OPERATORS.contains(&word.as_str()) {
                    tokens[0] = Raw::leaf(Rule::Operator, word);
                }
            }
        }

        let is_aggregator = tokens
            .first()
            .is_some_and(|t| inner_rule(t) == Some(Rule::HeaderName));

        if !is_aggregator && self.peek() == Some(INDENT) {
            tokens.push(self.parse_indented_section()?);
        }

        let rule = if is_aggregator {
            Rule::Aggregator
        } else {
            Rule::Line
        };
        Ok(Raw::branch(rule, tokens))
    }
}

/// `(map <value>) \`template\``
fn parse_map_macro(text: &str, line_no: usize) -> Result<Raw, ParseError> {
    let mut lexer = LineLexer::new(text, line_no);
    lexer.expect_char('(')?;
    let keyword = lexer.read_identifier();
    if keyword != "map" {
        return Err(ParseError::UnexpectedToken {
            line: line_no,
            found: keyword,
            expected: "`map`".to_string(),
        });
    }
    let value = lexer.next_value()?.ok_or_else(|| ParseError::UnexpectedToken {
        line: line_no,
        found: "end of line".to_string(),
        expected: "a value inside (map ...)".to_string(),
    })?;
    lexer.expect_char(')')?;
    let template = lexer.next_value()?.ok_or_else(|| ParseError::UnexpectedToken {
        line: line_no,
        found: "end of line".to_string(),
        expected: "a template after (map ...)".to_string(),
    })?;
    if inner_rule(&template) != Some(Rule::Template) {
        return Err(ParseError::UnexpectedToken {
            line: line_no,
            found: text.to_string(),
            expected: "a backtick template after (map ...)".to_string(),
        });
    }
    if lexer.next_value()?.is_some() {
        return Err(ParseError::UnexpectedToken {
            line: line_no,
            found: text.to_string(),
            expected: "end of line after the macro template".to_string(),
        });
    }
    Ok(Raw::branch(Rule::MapMacro, vec![value, template]))
}

/// Tokenize one logical line into `Value`-wrapped tokens.
fn lex_line(text: &str, line_no: usize) -> Result<Vec<Raw>, ParseError> {
    let mut lexer = LineLexer::new(text, line_no);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_value()? {
        tokens.push(tok);
    }
    Ok(tokens)
}

/// Tokenize a relation-literal cell, which must hold exactly one value.
fn lex_single(text: &str, line_no: usize) -> Result<Raw, ParseError> {
    let mut tokens = lex_line(text, line_no)?;
    if tokens.len() != 1 {
        return Err(ParseError::MalformedRow { line: line_no });
    }
    Ok(tokens.remove(0))
}

/// The rule of the token inside a `Value` wrapper (or of the token
/// itself when unwrapped).
fn inner_rule(raw: &Raw) -> Option<Rule> {
    match raw {
        Raw::Branch {
            rule: Rule::Value,
            children,
        } => children.first().map(|c| c.rule()),
        other => Some(other.rule()),
    }
}

fn var_text(raw: &Raw) -> Option<String> {
    if let Raw::Branch {
        rule: Rule::Value,
        children,
    } = raw
    {
        if let Some(Raw::Leaf {
            rule: Rule::Var,
            text,
        }) = children.first()
        {
            return Some(text.clone());
        }
    }
    None
}

fn first_word(line: &str) -> Option<&str> {
    line.trim_start().split_whitespace().next()
}

fn is_rule_line(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| c == '-')
}

/// Split a `| a | b |` line into trimmed cell texts, honoring quotes
/// and backticks so cell contents may contain pipes.
fn split_cells(text: &str, line_no: usize) -> Result<Vec<String>, ParseError> {
    let t = text.trim();
    if !t.starts_with('|') || !t.ends_with('|') || t.len() < 2 {
        return Err(ParseError::MalformedRow { line: line_no });
    }

    let inner: Vec<char> = t[1..t.len() - 1].chars().collect();
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut in_template = false;
    let mut i = 0;
    while i < inner.len() {
        let c = inner[i];
        match c {
            '"' if !in_template => in_string = !in_string,
            '\\' if in_string => {
                current.push(c);
                i += 1;
                if let Some(&next) = inner.get(i) {
                    current.push(next);
                    i += 1;
                }
                continue;
            }
            '`' if !in_string => in_template = !in_template,
            '|' if !in_string && !in_template => {
                cells.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    cells.push(current);

    let cells: Vec<String> = cells.into_iter().map(|c| c.trim().to_string()).collect();
    if cells.is_empty() || cells.iter().any(|c| c.is_empty()) {
        return Err(ParseError::MalformedRow { line: line_no });
    }
    Ok(cells)
}

/// Character-level scanner for the values of a single line.
struct LineLexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl LineLexer {
    fn new(text: &str, line: usize) -> Self {
        LineLexer {
            input: text.chars().collect(),
            position: 0,
            line,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_spaces(&mut self) {
        while self.current_char() == Some(' ') {
            self.advance();
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_spaces();
        if self.current_char() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                line: self.line,
                found: self
                    .current_char()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "end of line".to_string()),
                expected: format!("`{}`", expected),
            })
        }
    }

    fn read_identifier(&mut self) -> String {
        self.skip_spaces();
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self) -> Result<String, ParseError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(ParseError::UnexpectedToken {
                                line: self.line,
                                found: format!("\\{}", ch),
                                expected: "a valid escape sequence".to_string(),
                            });
                        }
                        None => return Err(ParseError::UnterminatedString { line: self.line }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
        Err(ParseError::UnterminatedString { line: self.line })
    }

    fn read_template(&mut self) -> Result<String, ParseError> {
        let mut result = String::new();
        self.advance(); // consume opening backtick
        while let Some(ch) = self.current_char() {
            if ch == '`' {
                self.advance();
                return Ok(result);
            }
            result.push(ch);
            self.advance();
        }
        Err(ParseError::UnterminatedTemplate { line: self.line })
    }

    fn read_number(&mut self) -> String {
        let mut number = String::new();
        if self.current_char() == Some('-') {
            number.push('-');
            self.advance();
        }
        let mut seen_dot = false;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !seen_dot
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        number
    }

    /// Read until whitespace; used for datetime bodies.
    fn read_bare(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch == ' ' || ch == ']' || ch == ')' {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    fn wrap(leaf: Raw) -> Raw {
        Raw::branch(Rule::Value, vec![leaf])
    }

    /// Next value token on the line, or `None` at end of line.
    fn next_value(&mut self) -> Result<Option<Raw>, ParseError> {
        self.skip_spaces();

        let ch = match self.current_char() {
            None => return Ok(None),
            Some(c) => c,
        };

        let token = match ch {
            '[' => {
                self.advance();
                let mut members = Vec::new();
                loop {
                    self.skip_spaces();
                    if self.current_char() == Some(']') {
                        self.advance();
                        break;
                    }
                    match self.next_value()? {
                        Some(v) => members.push(v),
                        None => {
                            return Err(ParseError::UnexpectedToken {
                                line: self.line,
                                found: "end of line".to_string(),
                                expected: "`]`".to_string(),
                            });
                        }
                    }
                }
                Self::wrap(Raw::branch(Rule::Set, members))
            }
            ':' if self.peek_char(1).is_some_and(is_ident_start) => {
                self.advance();
                let name = self.read_identifier();
                Self::wrap(Raw::leaf(Rule::HeaderName, name))
            }
            '`' => Self::wrap(Raw::leaf(Rule::Template, self.read_template()?)),
            '"' => Self::wrap(Raw::leaf(Rule::Str, self.read_string()?)),
            '$' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit() || c == '-') => {
                self.advance();
                Self::wrap(Raw::leaf(Rule::Decimal, self.read_number()))
            }
            '~' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                let text = self.read_bare();
                if !is_valid_datetime(&text) {
                    return Err(ParseError::UnexpectedToken {
                        line: self.line,
                        found: format!("~{}", text),
                        expected: "an ISO-8601 datetime".to_string(),
                    });
                }
                Self::wrap(Raw::leaf(Rule::DateTime, text))
            }
            c if c.is_ascii_digit() => Self::wrap(Raw::leaf(Rule::Number, self.read_number())),
            '-' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                Self::wrap(Raw::leaf(Rule::Number, self.read_number()))
            }
            '-' => {
                self.advance();
                Raw::leaf(Rule::Operator, "-")
            }
            '>' => {
                self.advance();
                Raw::leaf(Rule::Operator, ">")
            }
            '^' => {
                self.advance();
                Raw::leaf(Rule::Operator, "^")
            }
            c if is_ident_start(c) => {
                let ident = self.read_identifier();
                match self.current_char() {
                    Some(':') => {
                        self.advance();
                        if self.current_char() == Some('*') {
                            self.advance();
                            Self::wrap(Raw::leaf(Rule::AllHeaders, ident))
                        } else {
                            Self::wrap(Raw::leaf(Rule::RelationName, ident))
                        }
                    }
                    Some('=') => {
                        self.advance();
                        let value =
                            self.next_value()?
                                .ok_or_else(|| ParseError::UnexpectedToken {
                                    line: self.line,
                                    found: "end of line".to_string(),
                                    expected: "a value after `=`".to_string(),
                                })?;
                        Self::wrap(Raw::branch(
                            Rule::NamedValue,
                            vec![Raw::leaf(Rule::Var, ident), value],
                        ))
                    }
                    _ => match ident.as_str() {
                        "true" | "false" => Self::wrap(Raw::leaf(Rule::Bool, ident)),
                        "null" => Self::wrap(Raw::leaf(Rule::Null, ident)),
                        _ => Self::wrap(Raw::leaf(Rule::Var, ident)),
                    },
                }
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    line: self.line,
                    found: other.to_string(),
                    expected: "a value".to_string(),
                });
            }
        };

        Ok(Some(token))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_valid_datetime(text: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}
