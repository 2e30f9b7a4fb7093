use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CallguardError, Result};

/// File names probed when no configuration path is given
pub const CONFIG_CANDIDATES: [&str; 3] = ["callguard.toml", "Callguard.toml", ".callguard.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the method-signature inventory lives
    pub inventory: InventoryConfig,

    /// Which trees are scanned and how files are selected
    pub scan: ScanConfig,

    /// Parser guards and worker pool sizing
    pub parsing: ParsingConfig,

    /// Report output settings
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// JSON document mapping group names to method descriptors
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Source trees scanned by the code pass
    pub source_dirs: Vec<PathBuf>,

    /// Documentation files or directories scanned by the docs pass
    pub docs_paths: Vec<PathBuf>,

    /// Extensions handed to the code extractor
    pub source_extensions: Vec<String>,

    /// Extensions handed to the documentation extractor
    pub doc_extensions: Vec<String>,

    /// Glob patterns excluded from both passes
    pub ignore_patterns: Vec<String>,

    /// Whether .gitignore files are honoured
    pub respect_gitignore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Maximum file size to parse (in bytes)
    pub max_file_size: u64,

    /// Per-file parse budget in milliseconds (0 = unbounded)
    pub parse_timeout_ms: u64,

    /// Concurrent file workers (0 = available parallelism)
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where the JSON report is written
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let source_extensions = ["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];
        let doc_extensions = ["md", "mdx", "markdown"];

        Self {
            inventory: InventoryConfig {
                path: PathBuf::from("api-inventory.json"),
            },
            scan: ScanConfig {
                source_dirs: vec![PathBuf::from("src")],
                docs_paths: vec![PathBuf::from("docs"), PathBuf::from("README.md")],
                source_extensions: source_extensions.iter().map(|e| e.to_string()).collect(),
                doc_extensions: doc_extensions.iter().map(|e| e.to_string()).collect(),
                ignore_patterns: vec![
                    "node_modules/".to_string(),
                    ".git/".to_string(),
                    "dist/".to_string(),
                    "build/".to_string(),
                    "coverage/".to_string(),
                ],
                respect_gitignore: true,
            },
            parsing: ParsingConfig {
                max_file_size: 1024 * 1024, // 1MB
                parse_timeout_ms: 2000,
                workers: 0,
            },
            report: ReportConfig {
                path: PathBuf::from("callguard-report.json"),
            },
        }
    }
}

impl ParsingConfig {
    /// Worker count with the `0 = auto` convention resolved
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CallguardError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CallguardError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CallguardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                for candidate in &CONFIG_CANDIDATES {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("callguard.toml");

        Config::default().save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.inventory.path, PathBuf::from("api-inventory.json"));
        assert_eq!(loaded.scan.source_dirs, vec![PathBuf::from("src")]);
        assert!(loaded.scan.source_extensions.contains(&"tsx".to_string()));
        assert_eq!(loaded.parsing.max_file_size, 1024 * 1024);
        assert!(loaded.scan.respect_gitignore);
    }

    #[test]
    fn test_missing_explicit_path_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(Some(dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.report.path, PathBuf::from("callguard-report.json"));
    }

    #[test]
    fn test_malformed_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("callguard.toml");
        std::fs::write(&path, "[inventory]\npath = 42\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, CallguardError::Config(_)));
    }

    #[test]
    fn test_effective_workers_honours_explicit_count() {
        let mut parsing = Config::default().parsing;
        parsing.workers = 3;
        assert_eq!(parsing.effective_workers(), 3);
        parsing.workers = 0;
        assert!(parsing.effective_workers() >= 1);
    }
}
