//! Transform registry: built-ins fixed at construction, extensions swappable.

use super::builtin::builtin_transforms;
use super::descriptor::{Params, Transform, TransformDescriptor, TransformSource};
use super::extension::discover_extensions;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Descriptors of one source, in discovery order. Keys are unique.
#[derive(Debug, Default)]
struct Catalog {
    entries: Vec<Arc<TransformDescriptor>>,
}

impl Catalog {
    fn load(transforms: Vec<Arc<dyn Transform>>, source: TransformSource) -> Self {
        let mut entries: Vec<Arc<TransformDescriptor>> = Vec::with_capacity(transforms.len());
        for transform in transforms {
            let descriptor = match TransformDescriptor::from_transform(transform, source) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Skipping {source} transform: {e}");
                    continue;
                }
            };
            if entries.iter().any(|d| d.key == descriptor.key) {
                tracing::warn!(
                    "Skipping {source} transform '{}': key is already registered",
                    descriptor.key
                );
                continue;
            }
            entries.push(Arc::new(descriptor));
        }
        Self { entries }
    }

    fn get(&self, key: &str) -> Option<Arc<TransformDescriptor>> {
        self.entries.iter().find(|d| d.key == key).cloned()
    }

    fn find_loose(&self, identifier: &str) -> Option<Arc<TransformDescriptor>> {
        self.entries
            .iter()
            .find(|d| d.matches_loosely(identifier))
            .cloned()
    }

    /// By `order`, then discovery sequence
    fn ordered(&self) -> Vec<Arc<TransformDescriptor>> {
        let mut ordered = self.entries.clone();
        ordered.sort_by_key(|d| d.order);
        ordered
    }
}

/// Serialisable listing entry, see [`TransformRegistry::catalog`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    pub description: String,
    pub defaults: Params,
    pub order: i32,
    pub source: TransformSource,
}

impl From<&TransformDescriptor> for CatalogEntry {
    fn from(d: &TransformDescriptor) -> Self {
        Self {
            key: d.key.clone(),
            name: d.name.clone(),
            description: d.description.clone(),
            defaults: d.defaults.clone(),
            order: d.order,
            source: d.source,
        }
    }
}

/// Holds every known transform.
///
/// Reads are lock-free. [`refresh_extensions`](Self::refresh_extensions) swaps the
/// whole extension catalog at once; descriptors already handed out stay valid.
pub struct TransformRegistry {
    builtins: Catalog,
    extensions: ArcSwap<Catalog>,
    extension_dir: Option<PathBuf>,
}

impl TransformRegistry {
    /// Registry over `builtins`, loading extensions from `extension_dir` if given
    pub fn new(builtins: Vec<Arc<dyn Transform>>, extension_dir: Option<PathBuf>) -> Self {
        let builtins = Catalog::load(builtins, TransformSource::Builtin);
        let extensions = extension_dir
            .as_deref()
            .map(load_extension_catalog)
            .unwrap_or_default();

        tracing::info!(
            "Transform registry ready: {} builtin, {} extension",
            builtins.entries.len(),
            extensions.entries.len()
        );

        Self {
            builtins,
            extensions: ArcSwap::from_pointee(extensions),
            extension_dir,
        }
    }

    /// Built-in transforms plus manifests found in `extension_dir`
    pub fn discover(extension_dir: Option<PathBuf>) -> Self {
        Self::new(builtin_transforms(), extension_dir)
    }

    pub fn builtins_only() -> Self {
        Self::new(builtin_transforms(), None)
    }

    /// Registry with programmatically supplied extension transforms
    pub fn with_extensions(
        builtins: Vec<Arc<dyn Transform>>,
        extensions: Vec<Arc<dyn Transform>>,
    ) -> Self {
        Self {
            builtins: Catalog::load(builtins, TransformSource::Builtin),
            extensions: ArcSwap::from_pointee(Catalog::load(
                extensions,
                TransformSource::Extension,
            )),
            extension_dir: None,
        }
    }

    pub fn extension_dir(&self) -> Option<&Path> {
        self.extension_dir.as_deref()
    }

    /// Built-ins in registry order
    pub fn builtins(&self) -> Vec<Arc<TransformDescriptor>> {
        self.builtins.ordered()
    }

    /// Snapshot of the current extensions in registry order
    pub fn extensions(&self) -> Vec<Arc<TransformDescriptor>> {
        self.extensions.load().ordered()
    }

    pub fn builtin_keys(&self) -> Vec<String> {
        self.builtins().iter().map(|d| d.key.clone()).collect()
    }

    pub fn get_builtin(&self, key: &str) -> Option<Arc<TransformDescriptor>> {
        self.builtins.get(key)
    }

    pub fn get_extension(&self, key: &str) -> Option<Arc<TransformDescriptor>> {
        self.extensions.load().get(key)
    }

    /// Re-scan the extension directory and swap in the result. Returns the new count.
    ///
    /// Without a directory the current extensions are kept.
    pub fn refresh_extensions(&self) -> usize {
        let Some(dir) = self.extension_dir.as_deref() else {
            tracing::debug!("No extension directory configured, nothing to refresh");
            return self.extensions.load().entries.len();
        };
        let catalog = load_extension_catalog(dir);
        let count = catalog.entries.len();
        self.extensions.store(Arc::new(catalog));
        tracing::info!("Reloaded {count} extension(s) from {}", dir.display());
        count
    }

    /// Find a transform by key or display name.
    ///
    /// Lookup order, first hit wins: exact built-in key, exact extension key, then a
    /// case-insensitive key-or-name match over built-ins and then extensions, each
    /// in discovery order.
    pub fn resolve(&self, identifier: &str) -> Option<Arc<TransformDescriptor>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        let extensions = self.extensions.load();
        self.builtins
            .get(identifier)
            .or_else(|| extensions.get(identifier))
            .or_else(|| self.builtins.find_loose(identifier))
            .or_else(|| extensions.find_loose(identifier))
    }

    /// Every transform as a serialisable entry, built-ins first
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.builtins()
            .iter()
            .chain(self.extensions().iter())
            .map(|d| CatalogEntry::from(d.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("builtins", &self.builtins.entries.len())
            .field("extensions", &self.extensions.load().entries.len())
            .field("extension_dir", &self.extension_dir)
            .finish()
    }
}

fn load_extension_catalog(dir: &Path) -> Catalog {
    let transforms: Vec<Arc<dyn Transform>> = discover_extensions(dir)
        .into_iter()
        .map(|t| Arc::new(t) as Arc<dyn Transform>)
        .collect();
    Catalog::load(transforms, TransformSource::Extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::descriptor::{FnTransform, TransformMeta};
    use polars::prelude::{Column, DataFrame};
    use std::collections::HashSet;
    use std::fs;

    fn identity(key: &str, name: &str, order: i32) -> Arc<dyn Transform> {
        Arc::new(FnTransform::new(
            TransformMeta::new(key, name).with_order(order),
            |df: &DataFrame, _: &Params| Ok(df.clone()),
        ))
    }

    const MANIFEST: &str =
        r#"{"contract_version": 1, "order": 5, "recipe": [{"op": "trim_whitespace"}]}"#;

    #[test]
    fn test_builtin_keys_unique_and_ordered() {
        let registry = TransformRegistry::builtins_only();
        let keys = registry.builtin_keys();
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert_eq!(
            keys,
            vec![
                "standardize_headers",
                "trim_spaces",
                "drop_duplicates",
                "handle_missing",
                "convert_types",
                "text_normalize"
            ]
        );
    }

    #[test]
    fn test_duplicate_and_empty_keys_skipped() {
        let registry = TransformRegistry::new(
            vec![
                identity("a", "First", 2),
                identity("a", "Second", 1),
                identity("", "Nameless", 0),
            ],
            None,
        );
        let builtins = registry.builtins();
        assert_eq!(builtins.len(), 1);
        assert_eq!(builtins[0].name, "First");
    }

    #[test]
    fn test_equal_order_keeps_discovery_sequence() {
        let registry = TransformRegistry::new(
            vec![identity("z", "Z", 1), identity("a", "A", 1), identity("m", "M", 0)],
            None,
        );
        assert_eq!(registry.builtin_keys(), vec!["m", "z", "a"]);
    }

    #[test]
    fn test_resolve_tie_break() {
        let registry = TransformRegistry::with_extensions(
            vec![identity("trim", "Trim", 1), identity("dedupe", "Clean", 2)],
            vec![identity("clean", "Trim", 1), identity("trim", "Ext Trim", 2)],
        );

        let hit = registry.resolve("trim").map(|d| (d.key.clone(), d.source));
        assert_eq!(hit, Some(("trim".to_owned(), TransformSource::Builtin)));

        // exact extension key beats a builtin display name
        let hit = registry.resolve("clean").map(|d| (d.key.clone(), d.source));
        assert_eq!(hit, Some(("clean".to_owned(), TransformSource::Extension)));

        let hit = registry.resolve("CLEAN ").map(|d| d.key.clone());
        assert_eq!(hit.as_deref(), Some("dedupe"));

        assert!(registry.resolve("missing").is_none());
        assert!(registry.resolve("  ").is_none());
    }

    #[test]
    fn test_refresh_swaps_extensions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("first.json"), MANIFEST)?;
        let registry = TransformRegistry::discover(Some(dir.path().to_path_buf()));
        assert_eq!(registry.extensions().len(), 1);

        let held = registry.get_extension("first");
        assert!(held.is_some());

        fs::remove_file(dir.path().join("first.json"))?;
        fs::write(dir.path().join("second.json"), MANIFEST)?;
        fs::write(dir.path().join("third.json"), MANIFEST)?;
        assert_eq!(registry.refresh_extensions(), 2);
        assert!(registry.get_extension("first").is_none());
        assert!(registry.get_extension("third").is_some());

        // descriptors captured before the refresh still work
        let df = DataFrame::new(vec![Column::new("city".into(), [" Izmir "])])?;
        assert!(held.is_some_and(|d| d.invoke(&df, &Params::new()).is_ok()));
        Ok(())
    }

    #[test]
    fn test_catalog_lists_both_sources() {
        let registry = TransformRegistry::with_extensions(
            vec![identity("b", "B", 0)],
            vec![identity("e", "E", 0)],
        );
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[1].source, TransformSource::Extension);
        let json = serde_json::to_value(&catalog[1]).unwrap_or_default();
        assert_eq!(json["source"], "extension");
    }
}
