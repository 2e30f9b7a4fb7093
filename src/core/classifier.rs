use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::call_site::{CallSite, MethodName};
use super::inventory::{InventoryIndex, MethodVariant};

/// Outcome of checking one call site against the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Valid,
    UnknownMethod,
    ArityMismatch,
    ShapeMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub call_site: CallSite,
    pub verdict: Verdict,
    pub detail: Option<String>,

    /// Set when the method name could not be resolved statically
    pub dynamic: bool,
}

impl ClassificationResult {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

/// Checks call sites for known names, accepted arity and first-argument shape
pub struct Classifier {
    object_hint: Regex,
}

impl Classifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Brace literals, Record<..>, and *Options / *Config / *Configuration types
            object_hint: Regex::new(r"^\s*\{|\bRecord\s*<|Options|Config")?,
        })
    }

    /// Whether a parameter type hint expects an object-like value
    pub fn is_object_like_hint(&self, hint: &str) -> bool {
        self.object_hint.is_match(hint)
    }

    pub fn classify(&self, call_site: CallSite, inventory: &InventoryIndex) -> ClassificationResult {
        let name = match &call_site.method {
            MethodName::Static(name) => name.clone(),
            MethodName::Dynamic => {
                return ClassificationResult {
                    call_site,
                    verdict: Verdict::Valid,
                    detail: Some("method name is computed at runtime and was not checked".to_string()),
                    dynamic: true,
                };
            }
        };

        let (verdict, detail) = match inventory.lookup(&name) {
            None => (
                Verdict::UnknownMethod,
                Some(format!("`{}` is not in the API inventory", name)),
            ),
            Some(variants) => self.check_variants(&name, &call_site, variants),
        };

        ClassificationResult {
            call_site,
            verdict,
            detail,
            dynamic: false,
        }
    }

    fn check_variants(
        &self,
        name: &str,
        call_site: &CallSite,
        variants: &[MethodVariant],
    ) -> (Verdict, Option<String>) {
        let count = call_site.argument_count;

        if !variants.iter().any(|variant| variant.accepts_arity(count)) {
            let accepted: Vec<String> = variants.iter().map(MethodVariant::arity_range).collect();
            return (
                Verdict::ArityMismatch,
                Some(format!(
                    "`{}` called with {} argument(s); accepted arity: {}",
                    name,
                    count,
                    accepted.join(", ")
                )),
            );
        }

        // Only the first positional argument is shape-checked, against every variant
        if let Some(first) = call_site.first_argument.as_ref().filter(|arg| arg.shape.is_literal()) {
            let offending = variants
                .iter()
                .filter_map(MethodVariant::first_param_hint)
                .find(|hint| self.is_object_like_hint(hint));

            if let Some(hint) = offending {
                return (
                    Verdict::ShapeMismatch,
                    Some(format!(
                        "first argument `{}` is {} but `{}` expects `{}`",
                        first.text,
                        first.shape.describe(),
                        name,
                        hint
                    )),
                );
            }
        }

        (Verdict::Valid, None)
    }
}
