//! Persistent user settings.
//!
//! Stored as pretty JSON at `<config dir>/neatdata/settings.json`. Every field has a
//! serde default, so older or hand-edited files with missing keys still load.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Directory scanned for extension manifests
    pub extensions_dir: Option<PathBuf>,
    /// Transform keys used when a request doesn't name any. Empty means every built-in.
    pub default_modules: Vec<String>,
    /// Write rolling log files in addition to console output
    pub log_to_file: bool,
    /// Where batch results are written
    pub output_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            extensions_dir: default_extensions_dir(),
            default_modules: Vec::new(),
            log_to_file: true,
            output_dir: None,
        }
    }
}

impl AppSettings {
    /// Settings from the standard location, or defaults when the file is missing or unreadable
    pub fn load() -> Self {
        match get_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring settings file {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).context("Invalid settings JSON")
    }

    pub fn save(&self) -> Result<()> {
        let path = get_settings_path().context("Failed to determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// `default_modules` as an ordered selection, `None` when it should fall back to all built-ins
    pub fn module_selection(&self) -> Option<&[String]> {
        (!self.default_modules.is_empty()).then_some(self.default_modules.as_slice())
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("neatdata"))
}

pub fn get_settings_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(SETTINGS_FILE))
}

fn default_extensions_dir() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("extensions"))
}
