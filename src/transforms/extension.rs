//! Extension transforms loaded from JSON manifests.
//!
//! Each `*.json` file in the extension directory describes one transform:
//!
//! ```json
//! {
//!   "contract_version": 1,
//!   "key": "city_cleanup",
//!   "name": "City Cleanup",
//!   "defaults": { "columns": ["city"] },
//!   "order": 40,
//!   "recipe": [
//!     { "op": "trim_whitespace", "columns": ["{columns}"] },
//!     { "op": "replace_values", "columns": ["{columns}"], "mapping": { "ist": "Istanbul" } }
//!   ]
//! }
//! ```
//!
//! Files whose name starts with `_` are ignored. A manifest that cannot be loaded
//! is logged and skipped; it never prevents the others from loading.

use super::descriptor::{CONTRACT_VERSION, Params, Transform, TransformMeta};
use super::recipe::{RecipeOp, apply_recipe};
use anyhow::{Context as _, Result, bail};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Order given to extensions that don't declare one
pub const DEFAULT_EXTENSION_ORDER: i32 = 100;

fn default_order() -> i32 {
    DEFAULT_EXTENSION_ORDER
}

/// On-disk manifest format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    pub contract_version: u32,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub defaults: Params,

    #[serde(default = "default_order")]
    pub order: i32,

    pub recipe: Vec<RecipeOp>,
}

impl ExtensionManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse extension manifest JSON")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        Self::from_json(&content)
    }
}

/// A transform backed by a validated recipe
#[derive(Debug, Clone)]
pub struct RecipeTransform {
    meta: TransformMeta,
    recipe: Vec<RecipeOp>,
    path: Option<PathBuf>,
}

impl RecipeTransform {
    /// Validate a manifest. `stem` supplies the key and name fallbacks.
    pub fn from_manifest(manifest: ExtensionManifest, stem: &str) -> Result<Self> {
        if manifest.contract_version != CONTRACT_VERSION {
            bail!(
                "Unsupported contract version {} (expected {CONTRACT_VERSION})",
                manifest.contract_version
            );
        }
        if manifest.recipe.is_empty() {
            bail!("Recipe is empty");
        }
        for (i, op) in manifest.recipe.iter().enumerate() {
            op.validate()
                .with_context(|| format!("Recipe operation {} is invalid", i + 1))?;
        }

        let key = manifest
            .key
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| normalize_key(stem));
        if key.is_empty() {
            bail!("Extension has no usable key");
        }
        let name = manifest
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| title_case(stem));

        let meta = TransformMeta {
            key,
            name,
            description: manifest.description,
            defaults: manifest.defaults,
            order: manifest.order,
        };

        Ok(Self {
            meta,
            recipe: manifest.recipe,
            path: None,
        })
    }

    pub fn recipe(&self) -> &[RecipeOp] {
        &self.recipe
    }

    /// Manifest file this transform came from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Transform for RecipeTransform {
    fn meta(&self) -> TransformMeta {
        self.meta.clone()
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        apply_recipe(df, &self.recipe, params)
    }
}

/// `"City Cleanup-v2"` -> `"city_cleanup_v2"`
pub fn normalize_key(stem: &str) -> String {
    let mut key = String::with_capacity(stem.len());
    for c in stem.trim().chars() {
        if c.is_alphanumeric() {
            key.extend(c.to_lowercase());
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_matches('_').to_owned()
}

/// `"city_cleanup"` -> `"City Cleanup"`
pub fn title_case(stem: &str) -> String {
    stem.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Load and validate a single manifest file
pub fn load_extension(path: &Path) -> Result<RecipeTransform> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let manifest = ExtensionManifest::from_file(path)?;
    let mut transform = RecipeTransform::from_manifest(manifest, stem)?;
    transform.path = Some(path.to_path_buf());
    Ok(transform)
}

/// Load every manifest in `dir`, sorted by file name.
///
/// A missing directory yields no extensions. Individual failures are logged and skipped.
pub fn discover_extensions(dir: &Path) -> Vec<RecipeTransform> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if dir.exists() {
                tracing::warn!("Cannot read extension directory {}: {e}", dir.display());
            } else {
                tracing::debug!("Extension directory {} does not exist", dir.display());
            }
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('_'))
        })
        .collect();
    paths.sort();

    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match load_extension(&path) {
            Ok(transform) => {
                tracing::debug!(
                    "Loaded extension '{}' from {}",
                    transform.meta.key,
                    path.display()
                );
                loaded.push(transform);
            }
            Err(e) => {
                tracing::warn!("Skipping extension {}: {e:#}", path.display());
            }
        }
    }
    loaded
}
