//! rego-doc - compile declarative policy documents to Rego

use anyhow::Context;
use clap::Parser;
use rego_doc_cli::{Config, OutputFormat};
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,rego_doc=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();

    match rego_doc_cli::run(&config) {
        Ok(output) => {
            std::io::stdout()
                .write_all(output.as_bytes())
                .context("Failed to write policy")?;
            Ok(())
        }
        Err(err) => {
            let report = rego_doc_cli::render_error(&err, config.format);
            match config.format {
                OutputFormat::Json => print!("{}", report),
                OutputFormat::Text => eprint!("{}", report),
            }
            std::process::exit(err.exit_code());
        }
    }
}
