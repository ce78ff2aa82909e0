use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::node::Node;
use crate::env::{Binding, DefBinding, Env, Resolved, StdFunction};
use crate::parser::ParseError;
use crate::relation::{self, AggSpec, CellArg, Relation};
use crate::validate;
use crate::value::{Compiled, Value};

/// Errors that can occur while compiling a section.
///
/// Compilation is fail-fast and non-recoverable: the first error
/// aborts the whole section, no partial result is produced. Errors
/// carry the names and header sets involved so a host can map them
/// back to source positions.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Macro-generated source failed to re-parse
    Parse(ParseError),

    /// A name has no binding in the current environment
    Scope { name: String, available: Vec<String> },

    /// A `let`/`def` declaration appears after the body has started
    SectionOrderIncorrect,

    /// The first body item is not a relation literal or a single
    /// relation/variable/set/all-headers reference
    FirstNodeNotARelationOrSet,

    /// A node that cannot appear as a body item at this position
    NodeNotValidBodyType,

    /// A macro-expanded fragment did not normalize to exactly one
    /// operator-led line
    MacroLineNotSingleLine { rendered: String },

    /// select requested headers outside the relation's schema
    Select {
        requested: Vec<String>,
        available: Vec<String>,
    },

    /// cross operands share a header
    Cross { left: Vec<String>, right: Vec<String> },

    /// union/difference operands have different header sets
    UnionOrDifference { left: Vec<String>, right: Vec<String> },

    /// join operands share no header
    Join { left: Vec<String>, right: Vec<String> },

    /// A referenced header does not exist on the relation
    MissingHeaders {
        requested: Vec<String>,
        available: Vec<String>,
    },

    /// A relation-literal row's arity differs from its header row
    RowNotSameLengthAsHeaders {
        headers: Vec<String>,
        row: Vec<String>,
    },

    /// A relation literal declares the same header twice
    NotUnique { header: String },

    /// A group aggregator output header coincides with a group-by header
    Group { colliding: Vec<String> },

    /// Composite-operator argument count does not match its formals
    OperatorArgs {
        operator: String,
        expected: usize,
        supplied: usize,
    },

    /// A name used in function position is not a function binding
    NotAFunction { name: String },

    /// A built-in other than union/difference applied to a Set operand
    SetOperatorUnsupported { operator: String },

    /// A standard-library callback reported a failure
    Function { name: String, message: String },

    /// Any other shape mismatch between a value and its use
    TypeMismatch { expected: String, found: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "macro expansion parse failure: {}", e),
            CompileError::Scope { name, available } => write!(
                f,
                "`{}` is not in scope (visible names: {})",
                name,
                available.join(", ")
            ),
            CompileError::SectionOrderIncorrect => {
                write!(f, "let/def declarations must precede the section body")
            }
            CompileError::FirstNodeNotARelationOrSet => write!(
                f,
                "a section must start with a relation literal or a relation/set reference"
            ),
            CompileError::NodeNotValidBodyType => {
                write!(f, "node is not valid at this position in a section body")
            }
            CompileError::MacroLineNotSingleLine { rendered } => write!(
                f,
                "macro template must expand to exactly one operator line, got `{}`",
                rendered
            ),
            CompileError::Select {
                requested,
                available,
            } => write!(
                f,
                "select: requested headers [{}] are not a subset of [{}]",
                requested.join(", "),
                available.join(", ")
            ),
            CompileError::Cross { left, right } => write!(
                f,
                "cross: header sets [{}] and [{}] must be disjoint",
                left.join(", "),
                right.join(", ")
            ),
            CompileError::UnionOrDifference { left, right } => write!(
                f,
                "union/difference: header sets [{}] and [{}] must be equal",
                left.join(", "),
                right.join(", ")
            ),
            CompileError::Join { left, right } => write!(
                f,
                "join: header sets [{}] and [{}] share no header",
                left.join(", "),
                right.join(", ")
            ),
            CompileError::MissingHeaders {
                requested,
                available,
            } => write!(
                f,
                "headers [{}] not found in [{}]",
                requested.join(", "),
                available.join(", ")
            ),
            CompileError::RowNotSameLengthAsHeaders { headers, row } => write!(
                f,
                "row [{}] does not match header count {}",
                row.join(", "),
                headers.len()
            ),
            CompileError::NotUnique { header } => {
                write!(f, "duplicate header `{}` in relation", header)
            }
            CompileError::Group { colliding } => write!(
                f,
                "group: aggregator output headers [{}] collide with group-by headers",
                colliding.join(", ")
            ),
            CompileError::OperatorArgs {
                operator,
                expected,
                supplied,
            } => write!(
                f,
                "operator `{}` takes {} arguments, got {}",
                operator, expected, supplied
            ),
            CompileError::NotAFunction { name } => {
                write!(f, "`{}` is not a registered function", name)
            }
            CompileError::SetOperatorUnsupported { operator } => {
                write!(f, "operator `{}` cannot be applied to a set", operator)
            }
            CompileError::Function { name, message } => {
                write!(f, "function `{}`: {}", name, message)
            }
            CompileError::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

/// A compiled section: the final accumulator value plus the
/// intermediate value after each body item, in source order. The AST
/// itself is never mutated, so hosts can pair `line_results` with the
/// original body items for display.
#[derive(Debug, Clone)]
pub struct CompiledSection {
    pub result: Compiled,
    pub line_results: Vec<Compiled>,
}

/// The section compiler/evaluator.
///
/// Holds the one piece of session state the pipeline needs: the
/// counter naming synthesized macro operators. Independent
/// compilations should each use their own `Compiler` so expansion
/// names stay deterministic.
#[derive(Default)]
pub struct Compiler {
    macro_counter: u64,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a section against an environment.
    ///
    /// Runs the section state machine: register declarations, establish
    /// the initial accumulator from the first body item, then thread
    /// the accumulator through each operator line.
    ///
    /// # Examples
    ///
    /// ```
    /// use dawdle_lang::{parse, standard_env, Compiled, Compiler};
    ///
    /// let ast = parse("| :a | :b |\n| 1 | 2 |\n").unwrap();
    /// let mut compiler = Compiler::new();
    /// let result = compiler.compile(&standard_env(), &ast).unwrap();
    /// match result.result {
    ///     Compiled::Relation(rel) => assert_eq!(rel.headers, vec!["a", "b"]),
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn compile(&mut self, env: &Env, section: &Node) -> Result<CompiledSection, CompileError> {
        let items = section
            .as_section()
            .ok_or(CompileError::NodeNotValidBodyType)?;

        let mut env = env.clone();
        let mut body: Vec<&Node> = Vec::new();
        for item in items {
            if item.is_declaration() {
                if !body.is_empty() {
                    return Err(CompileError::SectionOrderIncorrect);
                }
                env = self.register_declaration(&env, item)?;
            } else {
                body.push(item);
            }
        }

        let mut body_iter = body.into_iter();
        let first = body_iter
            .next()
            .ok_or(CompileError::FirstNodeNotARelationOrSet)?;
        let mut acc = self.initial_value(&env, first)?;
        let mut line_results = vec![acc.clone()];

        for item in body_iter {
            acc = match item {
                Node::Line(children) => self.compile_line(&env, acc, children)?,
                Node::MapMacro(children) => {
                    let (expanded_env, invocation) = self.expand_macro(&env, children)?;
                    env = expanded_env;
                    self.compile_line(&env, acc, &invocation)?
                }
                _ => return Err(CompileError::NodeNotValidBodyType),
            };
            line_results.push(acc.clone());
        }

        Ok(CompiledSection {
            result: acc,
            line_results,
        })
    }

    /// Compile only the declarations of a section and return the
    /// resulting bindings layered onto `base`. Used to build a
    /// reusable user environment without evaluating a body.
    pub fn lets_to_env(&mut self, base: &Env, section: &Node) -> Result<Env, CompileError> {
        let items = section
            .as_section()
            .ok_or(CompileError::NodeNotValidBodyType)?;
        let mut env = base.clone();
        for item in items {
            if !item.is_declaration() {
                break;
            }
            env = self.register_declaration(&env, item)?;
        }
        Ok(env)
    }

    /// Bind one `let`/`def` declaration, visible to everything after it.
    fn register_declaration(&mut self, env: &Env, node: &Node) -> Result<Env, CompileError> {
        match node {
            Node::Let(children) => match children.as_slice() {
                [Node::Var(name), body @ Node::Section(_)] => {
                    let compiled = self.compile(env, body)?;
                    Ok(env.bind(name.clone(), Binding::Let(compiled.result)))
                }
                _ => Err(CompileError::NodeNotValidBodyType),
            },
            Node::Def(children) => {
                let name = match children.first() {
                    Some(Node::Var(name)) => name.clone(),
                    _ => return Err(CompileError::NodeNotValidBodyType),
                };
                let body = match children.last() {
                    Some(body @ Node::Section(_)) => body.clone(),
                    _ => return Err(CompileError::NodeNotValidBodyType),
                };
                let mut formals = Vec::new();
                for formal in &children[1..children.len() - 1] {
                    match formal {
                        Node::Var(n) | Node::RelationName(n) => formals.push(n.clone()),
                        _ => return Err(CompileError::NodeNotValidBodyType),
                    }
                }
                let binding = Binding::Def(DefBinding {
                    formals,
                    body,
                    env: env.clone(),
                });
                Ok(env.bind(name, binding))
            }
            _ => Err(CompileError::NodeNotValidBodyType),
        }
    }

    /// Seed the accumulator from a section's first body item.
    fn initial_value(&mut self, env: &Env, node: &Node) -> Result<Compiled, CompileError> {
        match node {
            Node::RelationLiteral(children) => {
                Ok(Compiled::Relation(relation_from_literal(children)?))
            }
            Node::Line(children) => match children.as_slice() {
                [single] => self.resolve_initial(env, single),
                _ => Err(CompileError::FirstNodeNotARelationOrSet),
            },
            _ => Err(CompileError::FirstNodeNotARelationOrSet),
        }
    }

    fn resolve_initial(&mut self, env: &Env, node: &Node) -> Result<Compiled, CompileError> {
        match node {
            Node::Var(name) | Node::RelationName(name) => match env.lookup(name) {
                Some(Binding::Let(compiled)) => Ok(compiled.clone()),
                Some(Binding::Arg(Resolved::Compiled(compiled))) => Ok(compiled.clone()),
                Some(_) => Err(CompileError::FirstNodeNotARelationOrSet),
                None => Err(scope_error(env, name)),
            },
            Node::AllHeaders(name) => all_headers(env, name),
            Node::Set(members) => Ok(Compiled::Set(eval_set(env, members)?)),
            _ => Err(CompileError::FirstNodeNotARelationOrSet),
        }
    }

    /// Thread the accumulator through one operator line.
    fn compile_line(
        &mut self,
        env: &Env,
        acc: Compiled,
        children: &[Node],
    ) -> Result<Compiled, CompileError> {
        match children.first() {
            Some(Node::Operator(symbol)) => self.builtin(env, acc, symbol, &children[1..]),
            Some(Node::Var(name)) => match env.lookup(name) {
                Some(Binding::Def(def)) => {
                    let def = def.clone();
                    self.invoke_composite(env, acc, name, &def, &children[1..])
                }
                Some(_) => Err(CompileError::NodeNotValidBodyType),
                None => Err(scope_error(env, name)),
            },
            _ => Err(CompileError::NodeNotValidBodyType),
        }
    }

    /// Dispatch one of the eight built-ins: validate, then execute.
    fn builtin(
        &mut self,
        env: &Env,
        acc: Compiled,
        symbol: &str,
        arg_nodes: &[Node],
    ) -> Result<Compiled, CompileError> {
        // group keeps its trailing block raw: it holds aggregator
        // lines, not a sub-computation
        if symbol == "G" {
            return self.group(env, acc, arg_nodes);
        }

        let args = self.resolve_args(env, arg_nodes)?;

        match (symbol, acc) {
            (">", Compiled::Relation(rel)) => {
                let (func, cell_args) = function_and_cells(&args, arg_nodes)?;
                validate::filter(&rel, &func, &cell_args)?;
                Ok(Compiled::Relation(relation::filter(&rel, &func, &cell_args)?))
            }
            ("v", Compiled::Relation(rel)) => {
                let headers = header_args(&args)?;
                validate::select(&rel, &headers)?;
                Ok(Compiled::Relation(relation::select(&rel, &headers)))
            }
            ("^", Compiled::Relation(rel)) => {
                let new_header = match args.first() {
                    Some(Resolved::Header(h)) => h.clone(),
                    _ => {
                        return Err(CompileError::TypeMismatch {
                            expected: "a :header as the first extend argument".to_string(),
                            found: describe_args(&args),
                        });
                    }
                };
                let (func, cell_args) = function_and_cells(&args[1..], arg_nodes)?;
                validate::extend(&rel, &func, &cell_args)?;
                Ok(Compiled::Relation(relation::extend(
                    &rel,
                    &new_header,
                    &func,
                    &cell_args,
                )?))
            }
            ("X", Compiled::Relation(rel)) => {
                let other = relation_arg(&args, "cross")?;
                validate::cross(&rel, &other)?;
                Ok(Compiled::Relation(relation::cross(&rel, &other)))
            }
            ("U", Compiled::Relation(rel)) => {
                let other = relation_arg(&args, "union")?;
                validate::union_or_difference(&rel, &other)?;
                Ok(Compiled::Relation(relation::union(&rel, &other)))
            }
            ("-", Compiled::Relation(rel)) => {
                let other = relation_arg(&args, "difference")?;
                validate::union_or_difference(&rel, &other)?;
                Ok(Compiled::Relation(relation::difference(&rel, &other)))
            }
            ("J", Compiled::Relation(rel)) => {
                let other = relation_arg(&args, "join")?;
                validate::join(&rel, &other)?;
                Ok(Compiled::Relation(relation::join(&rel, &other)))
            }
            ("U", Compiled::Set(members)) => {
                let other = set_arg(&args, "union")?;
                Ok(Compiled::Set(relation::set_union(&members, &other)))
            }
            ("-", Compiled::Set(members)) => {
                let other = set_arg(&args, "difference")?;
                Ok(Compiled::Set(relation::set_difference(&members, &other)))
            }
            (_, Compiled::Set(_)) => Err(CompileError::SetOperatorUnsupported {
                operator: symbol.to_string(),
            }),
            (_, other) => Err(CompileError::TypeMismatch {
                expected: "a relation".to_string(),
                found: format!("{} operand for `{}`", other.type_name(), symbol),
            }),
        }
    }

    /// `G :a :b` with a trailing block of aggregator lines.
    fn group(
        &mut self,
        env: &Env,
        acc: Compiled,
        arg_nodes: &[Node],
    ) -> Result<Compiled, CompileError> {
        let rel = match acc {
            Compiled::Relation(rel) => rel,
            Compiled::Set(_) => {
                return Err(CompileError::SetOperatorUnsupported {
                    operator: "G".to_string(),
                });
            }
            other => {
                return Err(CompileError::TypeMismatch {
                    expected: "a relation".to_string(),
                    found: format!("{} operand for `G`", other.type_name()),
                });
            }
        };

        let (agg_section, key_nodes) = match arg_nodes.split_last() {
            Some((Node::Section(items), rest)) => (items, rest),
            _ => {
                return Err(CompileError::TypeMismatch {
                    expected: "an indented block of aggregators after `G`".to_string(),
                    found: "none".to_string(),
                });
            }
        };

        let mut group_by = Vec::new();
        for node in key_nodes {
            match node {
                Node::HeaderName(h) => group_by.push(h.clone()),
                _ => {
                    return Err(CompileError::TypeMismatch {
                        expected: "group-by :headers".to_string(),
                        found: describe(node).to_string(),
                    });
                }
            }
        }

        let mut aggs = Vec::new();
        for item in agg_section {
            let children = match item {
                Node::Aggregator(children) => children,
                _ => return Err(CompileError::NodeNotValidBodyType),
            };
            let (out, func_name, inputs) = match children.as_slice() {
                [Node::HeaderName(out), Node::Var(func), rest @ ..] if !rest.is_empty() => {
                    (out, func, rest)
                }
                _ => {
                    return Err(CompileError::TypeMismatch {
                        expected: "`:out fn :in...` aggregator".to_string(),
                        found: "malformed aggregator line".to_string(),
                    });
                }
            };
            let func = match env.lookup(func_name) {
                Some(Binding::Function(f)) => f.clone(),
                Some(_) => {
                    return Err(CompileError::NotAFunction {
                        name: func_name.clone(),
                    });
                }
                None => return Err(scope_error(env, func_name)),
            };
            let mut input_headers = Vec::new();
            for input in inputs {
                match input {
                    Node::HeaderName(h) => input_headers.push(h.clone()),
                    _ => {
                        return Err(CompileError::TypeMismatch {
                            expected: "aggregator input :headers".to_string(),
                            found: describe(input).to_string(),
                        });
                    }
                }
            }
            aggs.push(AggSpec {
                out: out.clone(),
                func,
                inputs: input_headers,
            });
        }

        validate::group(&rel, &group_by, &aggs)?;
        Ok(Compiled::Relation(relation::group(&rel, &group_by, &aggs)?))
    }

    /// Invoke a composite operator: bind formals in a child of the
    /// captured environment and compile the body there.
    fn invoke_composite(
        &mut self,
        env: &Env,
        acc: Compiled,
        name: &str,
        def: &DefBinding,
        arg_nodes: &[Node],
    ) -> Result<Compiled, CompileError> {
        let args = self.resolve_args(env, arg_nodes)?;

        let supplied = args.len() + 1; // the accumulator is the implicit first argument
        if supplied != def.formals.len() {
            return Err(CompileError::OperatorArgs {
                operator: name.to_string(),
                expected: def.formals.len(),
                supplied,
            });
        }

        let mut pairs = vec![(
            def.formals[0].clone(),
            Binding::Arg(Resolved::Compiled(acc)),
        )];
        for (formal, arg) in def.formals[1..].iter().zip(args) {
            pairs.push((formal.clone(), Binding::Arg(arg)));
        }
        let call_env = def.env.bind_many(pairs);

        Ok(self.compile(&call_env, &def.body)?.result)
    }

    /// Resolve a line's argument nodes, flattening set-typed arguments
    /// in place and compiling a trailing nested section into its final
    /// compiled value.
    fn resolve_args(&mut self, env: &Env, nodes: &[Node]) -> Result<Vec<Resolved>, CompileError> {
        let mut args = Vec::new();
        for node in nodes {
            args.extend(self.resolve_arg(env, node)?);
        }
        Ok(args)
    }

    fn resolve_arg(&mut self, env: &Env, node: &Node) -> Result<Vec<Resolved>, CompileError> {
        match node {
            Node::HeaderName(h) => Ok(vec![Resolved::Header(h.clone())]),
            Node::Var(name) | Node::RelationName(name) => match env.lookup(name) {
                Some(Binding::Let(compiled)) => Ok(flatten_compiled(compiled.clone())),
                Some(Binding::Function(f)) => Ok(vec![Resolved::Function(f.clone())]),
                Some(Binding::Arg(resolved)) => Ok(flatten_resolved(resolved.clone())),
                Some(Binding::Def(_)) => Err(CompileError::TypeMismatch {
                    expected: "a value argument".to_string(),
                    found: format!("composite operator `{}`", name),
                }),
                None => Err(scope_error(env, name)),
            },
            Node::AllHeaders(name) => Ok(flatten_compiled(all_headers(env, name)?)),
            Node::Set(members) => {
                let values = eval_set(env, members)?;
                Ok(flatten_compiled(Compiled::Set(values)))
            }
            Node::NamedValue(children) => match children.as_slice() {
                [_, value] => self.resolve_arg(env, value),
                _ => Err(CompileError::NodeNotValidBodyType),
            },
            Node::Template(t) => Ok(vec![Resolved::Value(Value::String(t.clone()))]),
            Node::Section(_) => {
                let compiled = self.compile(env, node)?;
                Ok(vec![Resolved::Compiled(compiled.result)])
            }
            Node::Number(_)
            | Node::Str(_)
            | Node::Bool(_)
            | Node::Null
            | Node::Decimal(_)
            | Node::DateTime(_) => Ok(vec![Resolved::Value(literal_value(node)?)]),
            other => Err(CompileError::TypeMismatch {
                expected: "a value argument".to_string(),
                found: describe(other).to_string(),
            }),
        }
    }

    /// Expand `(map set) \`template\`` into a synthesized composite
    /// operator plus an invocation of it. Each rendered line is fed
    /// back through the parser, the one legitimate re-entrant call
    /// from the compiler into the parsing pipeline.
    fn expand_macro(
        &mut self,
        env: &Env,
        children: &[Node],
    ) -> Result<(Env, Vec<Node>), CompileError> {
        let (value_node, template) = match children {
            [value, Node::Template(t)] => (value, t),
            _ => return Err(CompileError::NodeNotValidBodyType),
        };

        let members = self.macro_members(env, value_node)?;

        let mut lines = Vec::new();
        for member in members {
            let member_env = env.bind("_", Binding::Arg(Resolved::Value(member)));
            let rendered = render_template(template, &member_env)?;
            let parsed = crate::parse(&rendered)?;
            let line = match parsed.as_section() {
                Some(items) => match items.as_slice() {
                    [line @ Node::Line(children)]
                        if matches!(
                            children.first(),
                            Some(Node::Operator(_)) | Some(Node::Var(_))
                        ) =>
                    {
                        line.clone()
                    }
                    _ => {
                        return Err(CompileError::MacroLineNotSingleLine { rendered });
                    }
                },
                None => return Err(CompileError::MacroLineNotSingleLine { rendered }),
            };
            lines.push(line);
        }

        let name = format!("map_{}", self.macro_counter);
        self.macro_counter += 1;

        // synthesized operator: take one relation and pass it through
        // each generated line in sequence
        let mut body = vec![Node::Line(vec![Node::Var("relation".to_string())])];
        body.extend(lines);
        let def = DefBinding {
            formals: vec!["relation".to_string()],
            body: Node::Section(body),
            env: env.clone(),
        };

        let expanded = env.bind(name.clone(), Binding::Def(def));
        Ok((expanded, vec![Node::Var(name)]))
    }

    /// The member values a macro iterates over.
    fn macro_members(&mut self, env: &Env, node: &Node) -> Result<Vec<Value>, CompileError> {
        let compiled = match node {
            Node::Set(members) => Compiled::Set(eval_set(env, members)?),
            Node::AllHeaders(name) => all_headers(env, name)?,
            Node::Var(name) | Node::RelationName(name) => match env.lookup(name) {
                Some(Binding::Let(compiled)) => compiled.clone(),
                Some(Binding::Arg(Resolved::Compiled(compiled))) => compiled.clone(),
                Some(_) => {
                    return Err(CompileError::TypeMismatch {
                        expected: "a set".to_string(),
                        found: format!("binding `{}`", name),
                    });
                }
                None => return Err(scope_error(env, name)),
            },
            other => {
                return Err(CompileError::TypeMismatch {
                    expected: "a set".to_string(),
                    found: describe(other).to_string(),
                });
            }
        };
        match compiled {
            Compiled::Set(members) => Ok(members),
            Compiled::Headers(headers) => Ok(headers.into_iter().map(Value::Header).collect()),
            Compiled::Relation(_) => Err(CompileError::TypeMismatch {
                expected: "a set".to_string(),
                found: "relation".to_string(),
            }),
        }
    }
}

/// Render `{{ident}}` placeholders against the member-bound env.
fn render_template(template: &str, env: &Env) -> Result<String, CompileError> {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| CompileError::MacroLineNotSingleLine {
                rendered: template.to_string(),
            })?;
        let ident = after[..end].trim();
        out.push_str(&placeholder_value(env, ident)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn placeholder_value(env: &Env, ident: &str) -> Result<String, CompileError> {
    match env.lookup(ident) {
        Some(Binding::Arg(Resolved::Value(v))) => Ok(v.to_source()),
        Some(Binding::Arg(Resolved::Header(h))) => Ok(format!(":{}", h)),
        Some(_) => Err(CompileError::TypeMismatch {
            expected: "a value placeholder".to_string(),
            found: format!("binding `{}`", ident),
        }),
        None => Err(scope_error(env, ident)),
    }
}

/// Evaluate set-literal members to deduplicated values. Members are
/// literals, headers, or names bound to literal values.
fn eval_set(env: &Env, members: &[Node]) -> Result<Vec<Value>, CompileError> {
    let mut values: Vec<Value> = Vec::new();
    for member in members {
        let value = match member {
            Node::Var(name) => match env.lookup(name) {
                Some(Binding::Arg(Resolved::Value(v))) => v.clone(),
                Some(Binding::Arg(Resolved::Header(h))) => Value::Header(h.clone()),
                Some(_) => {
                    return Err(CompileError::TypeMismatch {
                        expected: "a literal set member".to_string(),
                        found: format!("binding `{}`", name),
                    });
                }
                None => return Err(scope_error(env, name)),
            },
            other => literal_value(other)?,
        };
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values)
}

/// Build a Relation from a normalized relation-literal node.
fn relation_from_literal(children: &[Node]) -> Result<Relation, CompileError> {
    let mut headers = Vec::new();
    let mut rows = Vec::new();
    for child in children {
        match child {
            Node::RlHeaders(cells) => {
                for cell in cells {
                    match cell {
                        Node::HeaderName(h) => headers.push(h.clone()),
                        other => {
                            return Err(CompileError::TypeMismatch {
                                expected: "a :header cell".to_string(),
                                found: describe(other).to_string(),
                            });
                        }
                    }
                }
            }
            Node::RlRow(cells) => {
                let row: Result<Vec<Value>, CompileError> =
                    cells.iter().map(literal_value).collect();
                rows.push(row?);
            }
            other => {
                return Err(CompileError::TypeMismatch {
                    expected: "relation-literal rows".to_string(),
                    found: describe(other).to_string(),
                });
            }
        }
    }
    Relation::new(headers, rows)
}

/// Interpret a leaf node's text payload as a runtime value.
pub fn literal_value(node: &Node) -> Result<Value, CompileError> {
    match node {
        Node::Number(text) => {
            if let Ok(n) = text.parse::<i64>() {
                Ok(Value::Integer(n))
            } else {
                text.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| CompileError::TypeMismatch {
                        expected: "a number".to_string(),
                        found: text.clone(),
                    })
            }
        }
        Node::Str(s) => Ok(Value::String(s.clone())),
        Node::Bool(text) => Ok(Value::Boolean(text == "true")),
        Node::Null => Ok(Value::Null),
        Node::Decimal(text) => Decimal::from_str(text)
            .map(Value::Decimal)
            .map_err(|_| CompileError::TypeMismatch {
                expected: "a decimal".to_string(),
                found: format!("${}", text),
            }),
        Node::DateTime(text) => parse_datetime(text).ok_or_else(|| CompileError::TypeMismatch {
            expected: "a datetime".to_string(),
            found: format!("~{}", text),
        }),
        Node::HeaderName(h) => Ok(Value::Header(h.clone())),
        Node::Template(t) => Ok(Value::String(t.clone())),
        other => Err(CompileError::TypeMismatch {
            expected: "a literal value".to_string(),
            found: describe(other).to_string(),
        }),
    }
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(Value::DateTime(dt));
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default()))
}

/// `name:*` resolves to the headers of the named relation.
fn all_headers(env: &Env, name: &str) -> Result<Compiled, CompileError> {
    let compiled = match env.lookup(name) {
        Some(Binding::Let(compiled)) => compiled.clone(),
        Some(Binding::Arg(Resolved::Compiled(compiled))) => compiled.clone(),
        Some(_) => {
            return Err(CompileError::TypeMismatch {
                expected: "a relation".to_string(),
                found: format!("binding `{}`", name),
            });
        }
        None => return Err(scope_error(env, name)),
    };
    match compiled {
        Compiled::Relation(rel) => Ok(Compiled::Headers(rel.headers)),
        Compiled::Headers(headers) => Ok(Compiled::Headers(headers)),
        Compiled::Set(_) => Err(CompileError::TypeMismatch {
            expected: "a relation".to_string(),
            found: "set".to_string(),
        }),
    }
}

fn flatten_compiled(compiled: Compiled) -> Vec<Resolved> {
    match compiled {
        Compiled::Set(members) => members
            .into_iter()
            .map(|v| match v {
                Value::Header(h) => Resolved::Header(h),
                v => Resolved::Value(v),
            })
            .collect(),
        Compiled::Headers(headers) => headers.into_iter().map(Resolved::Header).collect(),
        other => vec![Resolved::Compiled(other)],
    }
}

fn flatten_resolved(resolved: Resolved) -> Vec<Resolved> {
    match resolved {
        Resolved::Compiled(c @ (Compiled::Set(_) | Compiled::Headers(_))) => flatten_compiled(c),
        other => vec![other],
    }
}

/// First argument must be a function; the rest become per-row cells.
fn function_and_cells(
    args: &[Resolved],
    arg_nodes: &[Node],
) -> Result<(StdFunction, Vec<CellArg>), CompileError> {
    let func = match args.first() {
        Some(Resolved::Function(f)) => f.clone(),
        _ => {
            let name = arg_nodes
                .iter()
                .find_map(|n| match n {
                    Node::Var(name) => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "<missing>".to_string());
            return Err(CompileError::NotAFunction { name });
        }
    };

    let mut cells = Vec::new();
    for arg in &args[1..] {
        match arg {
            Resolved::Header(h) => cells.push(CellArg::Header(h.clone())),
            Resolved::Value(v) => cells.push(CellArg::Lit(v.clone())),
            other => {
                return Err(CompileError::TypeMismatch {
                    expected: "a :header or literal argument".to_string(),
                    found: format!("{:?}", other),
                });
            }
        }
    }
    Ok((func, cells))
}

fn header_args(args: &[Resolved]) -> Result<Vec<String>, CompileError> {
    args.iter()
        .map(|arg| match arg {
            Resolved::Header(h) => Ok(h.clone()),
            other => Err(CompileError::TypeMismatch {
                expected: "only :header arguments".to_string(),
                found: format!("{:?}", other),
            }),
        })
        .collect()
}

fn relation_arg(args: &[Resolved], operator: &str) -> Result<Relation, CompileError> {
    match args {
        [Resolved::Compiled(Compiled::Relation(rel))] => Ok(rel.clone()),
        _ => Err(CompileError::TypeMismatch {
            expected: format!("a single relation argument for {}", operator),
            found: describe_args(args),
        }),
    }
}

fn set_arg(args: &[Resolved], operator: &str) -> Result<Vec<Value>, CompileError> {
    // a set argument arrives flattened into its members
    let mut members = Vec::new();
    for arg in args {
        match arg {
            Resolved::Value(v) => members.push(v.clone()),
            Resolved::Header(h) => members.push(Value::Header(h.clone())),
            _ => {
                return Err(CompileError::TypeMismatch {
                    expected: format!("a set argument for {}", operator),
                    found: describe_args(args),
                });
            }
        }
    }
    Ok(members)
}

fn scope_error(env: &Env, name: &str) -> CompileError {
    CompileError::Scope {
        name: name.to_string(),
        available: env.names(),
    }
}

fn describe_args(args: &[Resolved]) -> String {
    format!("{} argument(s)", args.len())
}

fn describe(node: &Node) -> &'static str {
    match node {
        Node::Section(_) => "section",
        Node::Let(_) => "let declaration",
        Node::Def(_) => "def declaration",
        Node::Line(_) => "operator line",
        Node::Aggregator(_) => "aggregator",
        Node::MapMacro(_) => "map macro",
        Node::NamedValue(_) => "named value",
        Node::Set(_) => "set literal",
        Node::RelationLiteral(_) => "relation literal",
        Node::RlHeaders(_) => "relation headers",
        Node::RlRow(_) => "relation row",
        Node::Number(_) => "number",
        Node::Str(_) => "string",
        Node::Bool(_) => "boolean",
        Node::Null => "null",
        Node::Decimal(_) => "decimal",
        Node::DateTime(_) => "datetime",
        Node::Template(_) => "template",
        Node::Var(_) => "variable",
        Node::RelationName(_) => "relation name",
        Node::HeaderName(_) => "header name",
        Node::AllHeaders(_) => "all-headers marker",
        Node::Operator(_) => "operator",
    }
}
