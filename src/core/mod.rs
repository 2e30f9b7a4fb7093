// Call-site validation pipeline
mod call_site;
mod classifier;
mod engine;
mod heuristics;
mod inventory;
mod markdown;
mod report;
mod walker;

// Extraction strategies
mod languages;

pub use call_site::{Extraction, ParseFailure};
pub use classifier::Classifier;
pub use inventory::InventoryIndex;
pub use languages::{CallExtractor, ScriptDialect, ScriptExtractor};
pub use markdown::DocExtractor;
pub use report::{FileOutcome, ReportBuilder, ValidationReport};
pub use walker::{FileFilter, SourceWalker};

// Export the main engine
pub use engine::{CheckOptions, Engine};
