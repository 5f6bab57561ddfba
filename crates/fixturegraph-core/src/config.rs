//! Engine configuration.

use anyhow::Context;
use fixturegraph_schema::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MakerConfig {
    /// Types that never reuse a cached instance, on top of the schema flag.
    pub always_new_types: BTreeSet<TypeName>,
    /// First value handed out by the numeric sequence.
    pub number_start: i64,
    /// Upper length bound for text members without a `Size` annotation.
    pub default_text_length: usize,
    /// Maximum nesting of embedded records inside one instance.
    pub max_embedding_depth: usize,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            always_new_types: BTreeSet::new(),
            number_start: 1,
            default_text_length: 12,
            max_embedding_depth: 8,
        }
    }
}

impl MakerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read maker config {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("failed to parse maker config {}", path.display()))
    }

    pub fn always_new(mut self, type_name: impl Into<TypeName>) -> Self {
        self.always_new_types.insert(type_name.into());
        self
    }
}
