use crate::cli::{CliError, read_source};
use crate::{Compiler, parse, standard_env};

/// Options for the `check` command.
pub struct CheckOptions<'a> {
    /// Program file; `None` reads stdin
    pub path: Option<&'a str>,
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Only parse, don't compile
    pub syntax_only: bool,
}

/// Result of a successful check.
pub struct CheckResult {
    /// JSON rendering of the compiled value, or `None` for
    /// syntax-only runs
    pub output: Option<String>,
}

/// Parse (and unless `syntax_only`, compile) a dawdle program against
/// the standard environment.
pub fn execute_check(options: CheckOptions<'_>) -> Result<CheckResult, CliError> {
    let source = read_source(options.path)?;
    let ast = parse(&source)?;

    if options.syntax_only {
        return Ok(CheckResult { output: None });
    }

    let mut compiler = Compiler::new();
    let compiled = compiler.compile(&standard_env(), &ast)?;

    let output = if options.pretty {
        crate::to_json_pretty(&compiled.result)
    } else {
        crate::to_json(&compiled.result)
    };
    Ok(CheckResult {
        output: Some(output),
    })
}
