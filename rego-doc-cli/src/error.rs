//! CLI error types and exit codes

use rego_doc_compiler::CompilerError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status when the document is well-formed but fails validation
pub const EXIT_INVALID: i32 = 2;
/// Exit status for unreadable or unparseable input
pub const EXIT_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error(transparent)]
    Compilation(#[from] CompilerError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Compilation(CompilerError::Validation(_)) => EXIT_INVALID,
            _ => EXIT_FAILURE,
        }
    }

    /// One human-readable message per problem
    pub fn messages(&self) -> Vec<String> {
        match self {
            CliError::Compilation(CompilerError::Validation(diagnostics)) => diagnostics.messages(),
            other => vec![other.to_string()],
        }
    }
}
