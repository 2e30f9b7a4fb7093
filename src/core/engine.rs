// src/core/engine.rs
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use crate::config::Config;
use super::{
    CallExtractor, Classifier, DocExtractor, Extraction, FileFilter, FileOutcome, InventoryIndex,
    ParseFailure, ReportBuilder, ScriptDialect, ScriptExtractor, SourceWalker, ValidationReport,
};

/// Which extractor a file is handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPass {
    Code,
    Docs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanJob {
    pub path: PathBuf,
    pub pass: ScanPass,
}

/// Per-file guards shared by every worker
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub max_file_size: u64,
    pub parse_timeout: Duration,
}

/// Overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub inventory: Option<PathBuf>,
    pub source_dirs: Vec<PathBuf>,
    pub docs_paths: Vec<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// Main orchestration engine: walk, extract, classify, report
pub struct Engine {
    config: Config,
    classifier: Arc<Classifier>,
}

impl Engine {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let classifier = Classifier::new().context("Failed to build classifier")?;
        Ok(Self {
            config,
            classifier: Arc::new(classifier),
        })
    }

    /// Apply CLI overrides to the configuration
    pub fn apply(&mut self, options: CheckOptions) {
        if let Some(inventory) = options.inventory {
            self.config.inventory.path = inventory;
        }
        if !options.source_dirs.is_empty() {
            self.config.scan.source_dirs = options.source_dirs;
        }
        if !options.docs_paths.is_empty() {
            self.config.scan.docs_paths = options.docs_paths;
        }
        if let Some(report_path) = options.report_path {
            self.config.report.path = report_path;
        }
        if let Some(workers) = options.workers {
            self.config.parsing.workers = workers;
        }
    }

    /// Run both passes and persist the report.
    ///
    /// Errors returned here are configuration errors; findings are in the report.
    pub async fn check(&self) -> Result<ValidationReport> {
        let inventory = InventoryIndex::load(&self.config.inventory.path)?;
        info!(
            "Loaded {} inventory methods from {}",
            inventory.len(),
            self.config.inventory.path.display()
        );

        let jobs = self.collect_jobs()?;
        info!("Scanning {} file(s)", jobs.len());

        let report = self.run_jobs(jobs, Arc::new(inventory)).await;

        report
            .persist(&self.config.report.path)
            .with_context(|| format!("Failed to write report to {}", self.config.report.path.display()))?;
        info!("Report written to {}", self.config.report.path.display());

        Ok(report)
    }

    /// Enumerate code-pass files, then docs-pass files, without duplicates
    pub fn collect_jobs(&self) -> Result<Vec<ScanJob>> {
        let scan = &self.config.scan;
        let walker = SourceWalker::new(scan);
        let code_filter = FileFilter::new(&scan.source_extensions);
        let docs_filter = FileFilter::new(&scan.doc_extensions);

        let passes = [
            (ScanPass::Code, &scan.source_dirs, &code_filter),
            (ScanPass::Docs, &scan.docs_paths, &docs_filter),
        ];

        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for (pass, roots, filter) in passes {
            for root in roots {
                if !root.exists() {
                    warn!("Skipping missing {:?} root {}", pass, root.display());
                    continue;
                }
                for path in walker.walk(root, filter)? {
                    let job = ScanJob { path, pass };
                    if seen.insert(job.clone()) {
                        jobs.push(job);
                    }
                }
            }
        }

        Ok(jobs)
    }

    async fn run_jobs(&self, jobs: Vec<ScanJob>, inventory: Arc<InventoryIndex>) -> ValidationReport {
        let limits = ScanLimits {
            max_file_size: self.config.parsing.max_file_size,
            parse_timeout: Duration::from_millis(self.config.parsing.parse_timeout_ms),
        };
        let budget = task_budget(limits.parse_timeout);
        let permits = Arc::new(Semaphore::new(self.config.parsing.effective_workers()));

        let mut tasks = JoinSet::new();
        for job in jobs {
            let permits = Arc::clone(&permits);
            let inventory = Arc::clone(&inventory);
            let classifier = Arc::clone(&self.classifier);

            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                let path = job.path.clone();
                let worker = tokio::task::spawn_blocking(move || {
                    scan_file(&job, limits, &inventory, &classifier)
                });

                let finished = if budget.is_zero() {
                    Ok::<_, Elapsed>(worker.await)
                } else {
                    tokio::time::timeout(budget, worker).await
                };

                settle(&path, budget, finished)
            });
        }

        let mut builder = ReportBuilder::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => builder.add(outcome),
                Err(e) => warn!("Scan task aborted: {}", e),
            }
        }

        builder.finish()
    }
}

/// Wall-clock budget for one worker: twice the parser budget, zero meaning unbounded
fn task_budget(parse_timeout: Duration) -> Duration {
    parse_timeout.checked_mul(2).unwrap_or(Duration::MAX)
}

/// Turn a worker that panicked or overran its budget into a parse failure for its file
fn settle(
    path: &Path,
    budget: Duration,
    finished: std::result::Result<std::result::Result<FileOutcome, JoinError>, Elapsed>,
) -> FileOutcome {
    match finished {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => failed_outcome(path, format!("extraction task failed: {}", e)),
        Err(_) => failed_outcome(path, format!("extraction exceeded {} ms", budget.as_millis())),
    }
}

fn failed_outcome(path: &Path, message: String) -> FileOutcome {
    warn!("{}: {}", path.display(), message);
    FileOutcome {
        results: Vec::new(),
        failures: vec![ParseFailure::whole_file(path, message)],
    }
}

/// Read, extract and classify a single file. Never fails; problems become parse failures.
pub fn scan_file(
    job: &ScanJob,
    limits: ScanLimits,
    inventory: &InventoryIndex,
    classifier: &Classifier,
) -> FileOutcome {
    let path = job.path.as_path();

    let extraction = match read_guarded(path, limits.max_file_size) {
        Ok(text) => extract_text(job, &text, limits),
        Err(message) => Extraction::failed(ParseFailure::whole_file(path, message)),
    };

    for failure in &extraction.failures {
        debug!("{}:{}: {}", failure.file.display(), failure.line, failure.message);
    }

    FileOutcome {
        results: extraction
            .calls
            .into_iter()
            .map(|call| classifier.classify(call, inventory))
            .collect(),
        failures: extraction.failures,
    }
}

fn read_guarded(path: &Path, max_file_size: u64) -> std::result::Result<String, String> {
    let metadata = std::fs::metadata(path).map_err(|e| format!("unreadable file: {}", e))?;
    if metadata.len() > max_file_size {
        return Err(format!(
            "file is {} bytes, above the {} byte limit",
            metadata.len(),
            max_file_size
        ));
    }
    std::fs::read_to_string(path).map_err(|e| format!("unreadable file: {}", e))
}

fn extract_text(job: &ScanJob, text: &str, limits: ScanLimits) -> Extraction {
    let timeout_micros = limits.parse_timeout.as_micros() as u64;
    let path = job.path.as_path();

    let extracted = match job.pass {
        ScanPass::Code => ScriptExtractor::new(ScriptDialect::from_path(path), timeout_micros)
            .and_then(|mut extractor| extractor.extract(text, path)),
        ScanPass::Docs => DocExtractor::new(timeout_micros)
            .and_then(|mut extractor| extractor.extract(text, path)),
    };

    extracted.unwrap_or_else(|e| Extraction::failed(ParseFailure::whole_file(path, e.to_string())))
}
