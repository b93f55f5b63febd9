use crate::transforms::Params;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A cleaning run described as JSON, used by `neatdata run`.
///
/// When `ordered` is present it wins over `core`/`extensions` and is resolved by
/// key or name in the given order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Input table path
    pub input: PathBuf,

    /// Output table path, format from the extension
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Built-in keys; omitted means all built-ins, `[]` means none
    #[serde(default)]
    pub core: Option<Vec<String>>,

    /// Extension keys; omitted means none
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    #[serde(default)]
    pub ordered: Option<Vec<String>>,

    /// Parameter overrides keyed by transform key
    #[serde(default)]
    pub params: HashMap<String, Params>,
}

impl PipelineRequest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read pipeline request file")?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline request JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize pipeline request")
    }
}
