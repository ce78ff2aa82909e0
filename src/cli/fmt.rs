use crate::cli::{CliError, read_source};
use crate::{parse, serialize};

/// Reformat a dawdle program: parse it and render it back with
/// canonical indentation and aligned relation literals.
pub fn execute_fmt(path: Option<&str>) -> Result<String, CliError> {
    let source = read_source(path)?;
    let ast = parse(&source)?;
    Ok(serialize(&ast))
}
