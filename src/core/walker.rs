use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::ScanConfig;
use crate::error::{CallguardError, Result};

/// Extension-based file selection for one scanning pass
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: HashSet<String>,
}

impl FileFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }
}

/// Deterministic, gitignore-aware directory traversal
#[derive(Debug, Clone)]
pub struct SourceWalker {
    ignore_patterns: Vec<String>,
    respect_gitignore: bool,
}

impl SourceWalker {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            ignore_patterns: config.ignore_patterns.clone(),
            respect_gitignore: config.respect_gitignore,
        }
    }

    /// Lazily yield matching files under `root` in file-name order.
    ///
    /// `root` may also be a single file. Unreadable entries are logged and
    /// skipped; only an invalid ignore pattern is an error.
    pub fn walk<'a>(
        &self,
        root: &Path,
        filter: &'a FileFilter,
    ) -> Result<impl Iterator<Item = PathBuf> + 'a> {
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &self.ignore_patterns {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| CallguardError::Config(format!("invalid ignore pattern '{}': {}", pattern, e)))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| CallguardError::Config(e.to_string()))?;

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .overrides(overrides)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        Ok(walker.filter_map(move |entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().map_or(false, |t| t.is_file()) && filter.matches(path) {
                    Some(entry.into_path())
                } else {
                    None
                }
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn walker() -> SourceWalker {
        SourceWalker::new(&Config::default().scan)
    }

    #[test]
    fn test_walk_is_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        temp.child("b.ts").write_str("").unwrap();
        temp.child("a.js").write_str("").unwrap();
        temp.child("notes.md").write_str("").unwrap();
        temp.child("lib/z.tsx").write_str("").unwrap();
        temp.child("lib/c.mts").write_str("").unwrap();

        let filter = FileFilter::new(["ts", "tsx", "js", "mts"]);
        let files: Vec<_> = walker()
            .walk(temp.path(), &filter)
            .unwrap()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a.js"),
                PathBuf::from("b.ts"),
                PathBuf::from("lib/c.mts"),
                PathBuf::from("lib/z.tsx"),
            ]
        );
    }

    #[test]
    fn test_walk_is_restartable_with_another_filter() {
        let temp = TempDir::new().unwrap();
        temp.child("index.ts").write_str("").unwrap();
        temp.child("README.md").write_str("").unwrap();

        let walker = walker();
        let code = FileFilter::new(["ts"]);
        let docs = FileFilter::new([".MD"]);

        assert_eq!(walker.walk(temp.path(), &code).unwrap().count(), 1);
        let doc_files: Vec<_> = walker.walk(temp.path(), &docs).unwrap().collect();
        assert_eq!(doc_files, vec![temp.child("README.md").path().to_path_buf()]);
    }

    #[test]
    fn test_ignore_patterns_prune_directories() {
        let temp = TempDir::new().unwrap();
        temp.child("src/app.ts").write_str("").unwrap();
        temp.child("node_modules/dep/index.ts").write_str("").unwrap();
        temp.child("dist/app.js").write_str("").unwrap();

        let filter = FileFilter::new(["ts", "js"]);
        let files: Vec<_> = walker().walk(temp.path(), &filter).unwrap().collect();
        assert_eq!(files, vec![temp.child("src/app.ts").path().to_path_buf()]);
    }

    #[test]
    fn test_single_file_root_and_missing_root() {
        let temp = TempDir::new().unwrap();
        temp.child("README.md").write_str("# hi").unwrap();
        let filter = FileFilter::new(["md"]);

        let single: Vec<_> = walker()
            .walk(temp.child("README.md").path(), &filter)
            .unwrap()
            .collect();
        assert_eq!(single.len(), 1);

        let missing = walker().walk(&temp.path().join("docs"), &filter).unwrap().count();
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_invalid_ignore_pattern_is_config_error() {
        let mut scan = Config::default().scan;
        scan.ignore_patterns = vec!["[".to_string()];
        let filter = FileFilter::new(["ts"]);
        let temp = TempDir::new().unwrap();

        assert!(matches!(
            SourceWalker::new(&scan).walk(temp.path(), &filter),
            Err(CallguardError::Config(_))
        ));
    }
}
