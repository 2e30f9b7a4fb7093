use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::config::Config;
use crate::core::{CheckOptions, Engine};
use crate::error::CallguardError;

/// Label for a fatal error, keeping configuration problems apart from tool failures
pub fn failure_label(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<CallguardError>() {
        Some(CallguardError::Config(_) | CallguardError::InventoryLoad { .. }) => "configuration error",
        _ => "error",
    }
}

#[derive(Parser)]
#[command(name = "callguard")]
#[command(about = "Validate client method calls in code and docs against an API inventory")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan sources and docs, write the report, exit non-zero on findings
    Check {
        /// API inventory JSON document
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Source directory to scan (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Documentation file or directory to scan (repeatable)
        #[arg(short, long)]
        docs: Vec<PathBuf>,

        /// Report output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent file workers (0 = available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<ExitCode> {
        match self.command {
            Commands::Check { inventory, sources, docs, output, jobs } => {
                let mut engine = Engine::new(self.config.as_deref())?;
                engine.apply(CheckOptions {
                    inventory,
                    source_dirs: sources,
                    docs_paths: docs,
                    report_path: output,
                    workers: jobs,
                });

                let report = engine.check().await?;
                for record in report.invalid_records() {
                    info!(
                        "{}:{}:{} {} ({})",
                        record.file,
                        record.line,
                        record.column,
                        record.method,
                        record.detail.as_deref().unwrap_or("invalid")
                    );
                }
                println!("{}", report.summary_line());
                Ok(report.exit_code())
            }
            Commands::Init { path, force } => {
                let target = path.unwrap_or_else(|| PathBuf::from(".")).join("callguard.toml");
                if target.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", target.display());
                }
                Config::default().save(&target)?;
                println!("Wrote {}", target.display());
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn config_in(temp: &TempDir) -> Config {
        temp.child("api-inventory.json")
            .write_str(r#"{ "core": [ { "name": "ping", "minArity": 0, "maxArity": 0 } ] }"#)
            .unwrap();
        let mut config = Config::default();
        config.inventory.path = temp.path().join("api-inventory.json");
        config.scan.source_dirs = vec![];
        config.scan.docs_paths = vec![];
        config.report.path = temp.path().join("report.json");
        config
    }

    #[test]
    fn test_failure_labels() {
        let config = anyhow::Error::from(CallguardError::Config("bad glob".to_string()));
        assert_eq!(failure_label(&config), "configuration error");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let wrapped = Err::<(), _>(CallguardError::Io(io))
            .context("Failed to write report")
            .unwrap_err();
        assert_eq!(failure_label(&wrapped), "error");
    }

    #[tokio::test]
    async fn test_missing_inventory_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        config.inventory.path = temp.path().join("absent.json");

        let err = Engine::with_config(config).unwrap().check().await.unwrap_err();
        assert_eq!(failure_label(&err), "configuration error");
    }

    #[tokio::test]
    async fn test_unwritable_report_is_a_tool_error() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        // A directory cannot be overwritten with the report
        config.report.path = temp.path().to_path_buf();

        let err = Engine::with_config(config).unwrap().check().await.unwrap_err();
        assert_eq!(failure_label(&err), "error");
        assert!(format!("{:#}", err).contains("Failed to write report"));
    }
}
