//! rego-doc command line front end
//!
//! Reads a JSON policy document, compiles it, and renders either the
//! generated policy or the problems found in it.

pub mod config;
pub mod error;

pub use config::{Config, OutputFormat};
pub use error::CliError;

use rego_doc_compiler::{CompiledPolicy, RegoCompiler};
use std::io::Read;
use std::path::Path;

/// Load the raw document text named by `input`.
pub fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .map_err(CliError::Stdin)?;
        return Ok(source);
    }

    let path = Path::new(input);
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Compile the configured input and render the success output.
pub fn run(config: &Config) -> Result<String, CliError> {
    let source = read_input(&config.input)?;
    tracing::debug!(input = %config.input, bytes = source.len(), "Read policy document");

    let compiled = RegoCompiler::new().compile_json(&source)?;
    tracing::info!(id = %compiled.id, "Compiled policy document");

    Ok(render_policy(&compiled, config.format, config.id_only))
}

/// Render a compiled policy for stdout
pub fn render_policy(compiled: &CompiledPolicy, format: OutputFormat, id_only: bool) -> String {
    match (format, id_only) {
        (_, true) => format!("{}\n", compiled.id),
        (OutputFormat::Text, false) => compiled.rego.clone(),
        (OutputFormat::Json, false) => {
            let body = serde_json::json!({ "id": compiled.id, "rego": compiled.rego });
            format!("{}\n", body)
        }
    }
}

/// Render a failure; JSON reports go to stdout, text goes to stderr
pub fn render_error(err: &CliError, format: OutputFormat) -> String {
    let messages = err.messages();
    match format {
        OutputFormat::Text => messages.iter().map(|m| format!("{}\n", m)).collect(),
        OutputFormat::Json => {
            format!("{}\n", serde_json::json!({ "errors": messages }))
        }
    }
}
