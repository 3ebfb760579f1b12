//! Command line configuration
//!
//! Every option can also be supplied through the environment, which is how
//! the binary is usually driven from provisioning tooling.

use clap::{Parser, ValueEnum};

/// Compile a declarative policy document into Rego
#[derive(Debug, Clone, Parser)]
#[command(name = "rego-doc", version)]
pub struct Config {
    /// Path to the JSON policy document, or `-` for stdin
    #[arg(env = "REGO_DOC_INPUT", default_value = "-")]
    pub input: String,

    /// Output format
    #[arg(short, long, value_enum, env = "REGO_DOC_FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Print only the content identifier
    #[arg(long)]
    pub id_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rego text on stdout, diagnostics on stderr
    Text,
    /// A single JSON object on stdout
    Json,
}

impl Config {
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}
