use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Callguard operations
#[derive(Error, Debug)]
pub enum CallguardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load API inventory {}: {reason}", path.display())]
    InventoryLoad { path: PathBuf, reason: String },

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, CallguardError>;
