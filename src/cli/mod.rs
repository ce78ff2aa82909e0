//! CLI support for dawdle-lang
//!
//! Provides programmatic access to dawdle CLI functionality for
//! embedding in other tools.

mod check;
mod fmt;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use fmt::execute_fmt;

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Parser error
    Parse(crate::ParseError),
    /// Compilation error
    Compile(crate::CompileError),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Compile(e) => write!(f, "Compile error: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No input provided. Pass a file or pipe a program to stdin.")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parse(e) => Some(e),
            CliError::Compile(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::NoInput => None,
        }
    }
}

impl From<crate::ParseError> for CliError {
    fn from(e: crate::ParseError) -> Self {
        CliError::Parse(e)
    }
}

impl From<crate::CompileError> for CliError {
    fn from(e: crate::CompileError) -> Self {
        CliError::Compile(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Read a program from a file argument or, failing that, stdin.
pub(crate) fn read_source(path: Option<&str>) -> Result<String, CliError> {
    use std::io::Read;

    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            if atty::is(atty::Stream::Stdin) {
                return Err(CliError::NoInput);
            }
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}
