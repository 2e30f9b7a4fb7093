use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CallguardError, Result};

/// One accepted call shape of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodVariant {
    pub min_arity: usize,

    /// `None` means unbounded
    pub max_arity: Option<usize>,

    /// Free-text type descriptors, in parameter order
    pub param_type_hints: Vec<String>,
}

impl MethodVariant {
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_arity && self.max_arity.map_or(true, |max| count <= max)
    }

    pub fn first_param_hint(&self) -> Option<&str> {
        self.param_type_hints.first().map(String::as_str)
    }

    /// `1..=2`, `0..=0` or `1..` style rendering for report details
    pub fn arity_range(&self) -> String {
        match self.max_arity {
            Some(max) => format!("{}..={}", self.min_arity, max),
            None => format!("{}..", self.min_arity),
        }
    }
}

/// Method descriptor as written by the inventory extraction tool
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    name: Option<String>,
    min_arity: Option<usize>,
    max_arity: Option<usize>,
    #[serde(default)]
    param_types: Vec<RawParamType>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawParamType {
    Text(String),
    Typed {
        #[serde(rename = "type")]
        ty: String,
    },
}

impl RawParamType {
    fn into_hint(self) -> String {
        match self {
            RawParamType::Text(text) => text,
            RawParamType::Typed { ty } => ty,
        }
    }
}

/// Read-only lookup of method name to its accepted variants
#[derive(Debug, Clone, Default)]
pub struct InventoryIndex {
    methods: HashMap<String, Vec<MethodVariant>>,
}

impl InventoryIndex {
    /// Load the inventory document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CallguardError::InventoryLoad {
                path: path.to_path_buf(),
                reason: "document not found".to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CallguardError::InventoryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let index = Self::parse(&content, path)?;
        debug!("Loaded {} methods from {}", index.len(), path.display());
        Ok(index)
    }

    /// Build an index from an in-memory JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self> {
        let load_error = |reason: String| CallguardError::InventoryLoad {
            path: PathBuf::from(origin),
            reason,
        };

        let groups: BTreeMap<String, Vec<RawDescriptor>> = serde_json::from_str(content)
            .map_err(|e| load_error(format!("expected a mapping of group names to method lists: {}", e)))?;

        let mut methods: HashMap<String, Vec<MethodVariant>> = HashMap::new();

        for (group, descriptors) in groups {
            for descriptor in descriptors {
                let name = descriptor.name.unwrap_or_else(|| group.clone());
                if name.is_empty() {
                    return Err(load_error(format!("empty method name in group '{}'", group)));
                }

                let variant = MethodVariant {
                    min_arity: descriptor.min_arity.unwrap_or(0),
                    max_arity: descriptor.max_arity,
                    param_type_hints: descriptor
                        .param_types
                        .into_iter()
                        .map(RawParamType::into_hint)
                        .collect(),
                };

                if let Some(max) = variant.max_arity {
                    if variant.min_arity > max {
                        return Err(load_error(format!(
                            "method '{}' in group '{}' has minArity {} above maxArity {}",
                            name, group, variant.min_arity, max
                        )));
                    }
                }

                // Same name in several groups: keep every distinct variant
                let variants = methods.entry(name).or_default();
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }

        Ok(Self { methods })
    }

    pub fn lookup(&self, method: &str) -> Option<&[MethodVariant]> {
        self.methods.get(method).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn test_missing_bounds_are_normalised() {
        let index = InventoryIndex::from_json_str(
            r#"{ "core": [ { "name": "ping" }, { "name": "quit", "maxArity": 0 } ] }"#,
        )
        .unwrap();

        let ping = &index.lookup("ping").unwrap()[0];
        assert_eq!(ping.min_arity, 0);
        assert_eq!(ping.max_arity, None);
        assert!(ping.accepts_arity(7));

        let quit = &index.lookup("quit").unwrap()[0];
        assert_eq!(quit.max_arity, Some(0));
        assert!(quit.accepts_arity(0));
        assert!(!quit.accepts_arity(1));
    }

    #[test]
    fn test_null_max_arity_is_unbounded() {
        let index = InventoryIndex::from_json_str(r#"{ "del": [ { "minArity": 1, "maxArity": null } ] }"#).unwrap();
        let del = &index.lookup("del").unwrap()[0];
        assert_eq!(del.max_arity, None);
        assert_eq!(del.arity_range(), "1..");
    }

    #[test]
    fn test_group_key_names_method_when_name_is_absent() {
        let index = InventoryIndex::from_json_str(r#"{ "get": [ { "minArity": 1, "maxArity": 1 } ] }"#).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("get").unwrap()[0].arity_range(), "1..=1");
        assert!(index.lookup("Get").is_none());
    }

    #[test]
    fn test_duplicate_names_across_groups_are_merged() {
        let index = InventoryIndex::from_json_str(
            r#"{
                "standalone": [ { "name": "set", "minArity": 2, "maxArity": 3, "paramTypes": ["string", "string", "SetOptions"] } ],
                "cluster":    [ { "name": "set", "minArity": 2, "maxArity": 4 } ],
                "batch":      [ { "name": "set", "minArity": 2, "maxArity": 4 } ]
            }"#,
        )
        .unwrap();

        let variants = index.lookup("set").unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().any(|v| v.accepts_arity(4)));
    }

    #[test]
    fn test_typed_param_entries_are_accepted() {
        let index = InventoryIndex::from_json_str(
            r#"{ "g": [ { "name": "scan", "paramTypes": [ { "name": "options", "type": "ScanOptions" }, "number" ] } ] }"#,
        )
        .unwrap();
        let scan = &index.lookup("scan").unwrap()[0];
        assert_eq!(scan.param_type_hints, vec!["ScanOptions".to_string(), "number".to_string()]);
        assert_eq!(scan.first_param_hint(), Some("ScanOptions"));
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for doc in [
            "not json",
            r#"["get"]"#,
            r#"{ "get": { "minArity": 1 } }"#,
            r#"{ "get": [ { "minArity": -1 } ] }"#,
            r#"{ "get": [ { "minArity": 3, "maxArity": 1 } ] }"#,
        ] {
            let err = InventoryIndex::from_json_str(doc).unwrap_err();
            assert!(matches!(err, CallguardError::InventoryLoad { .. }), "{doc}");
        }
    }

    #[test]
    fn test_load_from_disk_and_missing_document() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("inventory.json");
        file.write_str(r#"{ "strings": [ { "name": "get", "minArity": 1, "maxArity": 1 } ] }"#)
            .unwrap();

        let index = InventoryIndex::load(file.path()).unwrap();
        assert!(index.lookup("get").is_some());

        let err = InventoryIndex::load(temp.child("absent.json").path()).unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }
}
