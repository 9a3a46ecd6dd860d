//! Ptycho CLI - Command-line interface
//!
//! Batch reconstruction and training, data-arrival automation, and inspection
//! of plugins and configuration.

mod cli;
mod commands;
mod config_loader;
mod errors;
mod output;
mod progress;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level; logs stay on stderr so --json output parses
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match commands::execute(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            errors::from_anyhow(err).display();
            ExitCode::FAILURE
        }
    }
}
