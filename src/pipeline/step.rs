use crate::transforms::{Params, Transform, TransformDescriptor, TransformSource};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a step's callable came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOrigin {
    Builtin,
    Extension,
    Adhoc,
}

impl From<TransformSource> for StepOrigin {
    fn from(source: TransformSource) -> Self {
        match source {
            TransformSource::Builtin => Self::Builtin,
            TransformSource::Extension => Self::Extension,
        }
    }
}

impl fmt::Display for StepOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Extension => write!(f, "extension"),
            Self::Adhoc => write!(f, "adhoc"),
        }
    }
}

/// A resolved step with its final parameters.
///
/// Holds its own handle to the transform, so a registry refresh after `build`
/// doesn't affect an already built pipeline.
#[derive(Clone)]
pub struct PipelineStep {
    pub key: String,
    pub name: String,
    pub origin: StepOrigin,
    pub params: Params,
    transform: Arc<dyn Transform>,
}

impl PipelineStep {
    pub fn from_descriptor(descriptor: &TransformDescriptor, overrides: Option<&Params>) -> Self {
        Self {
            key: descriptor.key.clone(),
            name: descriptor.name.clone(),
            origin: descriptor.source.into(),
            params: descriptor.merged_params(overrides),
            transform: descriptor.transform(),
        }
    }

    pub fn adhoc(
        key: impl Into<String>,
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        params: Params,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            origin: StepOrigin::Adhoc,
            params,
            transform,
        }
    }

    pub(crate) fn apply(&self, df: &DataFrame) -> anyhow::Result<DataFrame> {
        self.transform.apply(df, &self.params)
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
