use super::{param_str, param_string_list};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::json;

/// Removes duplicate rows, optionally judged on a subset of columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropDuplicates;

impl Transform for DropDuplicates {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("drop_duplicates", "Drop Duplicates")
            .with_description(
                "Removes duplicate rows by the given columns, keeping the first or last occurrence.",
            )
            .with_default("subset", json!(null))
            .with_default("keep", json!("first"))
            .with_order(20)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let subset = param_string_list(params, "subset")?.filter(|cols| !cols.is_empty());
        let keep = match param_str(params, "keep")?.unwrap_or("first") {
            "first" => UniqueKeepStrategy::First,
            "last" => UniqueKeepStrategy::Last,
            "none" => UniqueKeepStrategy::None,
            other => bail!("Unknown keep strategy '{other}' (expected first, last or none)"),
        };

        df.unique_stable(subset.as_deref(), keep, None)
            .context("Failed to drop duplicate rows")
    }
}
