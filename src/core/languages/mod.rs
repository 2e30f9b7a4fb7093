//! Call-site extraction strategies.
//!
//! Every strategy turns a piece of text into call sites through the same
//! `CallExtractor` interface. The tree-sitter strategy lives here; the prose
//! strategy for markdown lives in `core::markdown`.

mod javascript;

pub use javascript::ScriptExtractor;

use std::path::Path;

use crate::error::Result;
use super::Extraction;

/// Trait that all call extractors must implement
pub trait CallExtractor {
    /// Find client call sites in `text`, attributing them to `file`
    fn extract(&mut self, text: &str, file: &Path) -> Result<Extraction>;
}

/// Grammar used to parse a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl ScriptDialect {
    /// Dialect for a source file, by extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "ts" | "mts" | "cts" => ScriptDialect::TypeScript,
            "tsx" => ScriptDialect::Tsx,
            _ => ScriptDialect::JavaScript,
        }
    }

    /// Dialect for a markdown fence info string, if it names a script language
    pub fn from_fence_tag(info: &str) -> Option<Self> {
        let tag = info
            .split(|c: char| c.is_whitespace() || c == '{' || c == ',')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match tag.as_str() {
            "ts" | "typescript" | "mts" | "cts" => Some(ScriptDialect::TypeScript),
            "tsx" => Some(ScriptDialect::Tsx),
            "js" | "javascript" | "jsx" | "mjs" | "cjs" | "node" => Some(ScriptDialect::JavaScript),
            _ => None,
        }
    }

    pub fn language(self) -> tree_sitter::Language {
        match self {
            ScriptDialect::JavaScript => tree_sitter_javascript::language(),
            ScriptDialect::TypeScript => tree_sitter_typescript::language_typescript(),
            ScriptDialect::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }
}
