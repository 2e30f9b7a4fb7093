use clap::Parser;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod config;
mod error;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting Callguard v{}", env!("CARGO_PKG_VERSION"));

    // Execute the requested command
    match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("callguard: {}: {:#}", cli::failure_label(&e), e);
            ExitCode::from(2)
        }
    }
}
