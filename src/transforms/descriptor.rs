//! Transform contract and the descriptor values held by the registry.

use crate::error::{NeatError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Version of the transform plugin contract. Extension manifests must declare it.
pub const CONTRACT_VERSION: u32 = 1;

/// Transform parameters, kept in declaration order.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Static metadata every transform exposes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMeta {
    /// Stable identifier, unique within its source
    pub key: String,

    /// Human-readable label, also matched case-insensitively by `resolve`
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Default parameters, merged under caller overrides
    #[serde(default)]
    pub defaults: Params,

    /// Position hint used when no explicit selection is given
    #[serde(default)]
    pub order: i32,
}

impl TransformMeta {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.defaults.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

/// The plugin contract.
///
/// `apply` must not mutate its input: it receives a shared reference and returns
/// a new frame. Implementations should be deterministic for a given input and
/// parameter set.
pub trait Transform: Send + Sync {
    /// Describe this transform
    fn meta(&self) -> TransformMeta;

    /// Produce a transformed copy of `df`
    fn apply(&self, df: &DataFrame, params: &Params) -> anyhow::Result<DataFrame>;
}

/// Wraps a closure as a [`Transform`]
pub struct FnTransform<F> {
    meta: TransformMeta,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&DataFrame, &Params) -> anyhow::Result<DataFrame> + Send + Sync,
{
    pub fn new(meta: TransformMeta, func: F) -> Self {
        Self { meta, func }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&DataFrame, &Params) -> anyhow::Result<DataFrame> + Send + Sync,
{
    fn meta(&self) -> TransformMeta {
        self.meta.clone()
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> anyhow::Result<DataFrame> {
        (self.func)(df, params)
    }
}

/// Where a descriptor was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformSource {
    Builtin,
    Extension,
}

impl fmt::Display for TransformSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Extension => write!(f, "extension"),
        }
    }
}

/// A validated transform as held by the registry. Immutable once created.
#[derive(Clone)]
pub struct TransformDescriptor {
    pub key: String,
    pub name: String,
    pub description: String,
    pub defaults: Params,
    pub order: i32,
    pub source: TransformSource,
    transform: Arc<dyn Transform>,
}

impl TransformDescriptor {
    /// Validate a transform's metadata and capture it as a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidTransform`] when the key is empty.
    pub fn from_transform(transform: Arc<dyn Transform>, source: TransformSource) -> Result<Self> {
        let meta = transform.meta();
        let key = meta.key.trim().to_owned();
        if key.is_empty() {
            return Err(NeatError::InvalidTransform(format!(
                "{source} transform '{}' has an empty key",
                meta.name
            )));
        }

        let name = if meta.name.trim().is_empty() {
            key.clone()
        } else {
            meta.name
        };

        Ok(Self {
            key,
            name,
            description: meta.description,
            defaults: meta.defaults,
            order: meta.order,
            source,
            transform,
        })
    }

    /// Defaults with `overrides` applied on top (overrides win per key)
    pub fn merged_params(&self, overrides: Option<&Params>) -> Params {
        let mut params = self.defaults.clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                params.insert(key.clone(), value.clone());
            }
        }
        params
    }

    /// Case-insensitive match on key or display name
    pub fn matches_loosely(&self, identifier: &str) -> bool {
        self.key.eq_ignore_ascii_case(identifier)
            || self.name.to_lowercase() == identifier.to_lowercase()
    }

    pub fn transform(&self) -> Arc<dyn Transform> {
        Arc::clone(&self.transform)
    }

    /// Run the underlying transform
    pub fn invoke(&self, df: &DataFrame, params: &Params) -> anyhow::Result<DataFrame> {
        self.transform.apply(df, params)
    }
}

impl fmt::Debug for TransformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformDescriptor")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("order", &self.order)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
