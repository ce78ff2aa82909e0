pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compiler;
pub mod env;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod preprocess;
pub mod relation;
pub mod serializer;
pub mod stdlib;
pub mod validate;
pub mod value;

pub use ast::{Node, Section};
pub use compiler::{CompileError, CompiledSection, Compiler};
pub use env::{Binding, DefBinding, Env, FunctionKind, Resolved, StdFunction};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser};
pub use relation::Relation;
pub use serializer::serialize;
pub use stdlib::standard_env;
pub use value::{Compiled, Value};

/// Turn source text into a canonical AST: indentation preprocessing,
/// grammar parsing, and normalization composed.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::from_source(source)?;
    let raw = parser.parse_program()?;
    Ok(normalize::normalize(&raw))
}
