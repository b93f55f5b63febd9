use super::{param_str, param_string_list, param_u64};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use serde_json::json;

/// Drops or fills missing values in explicitly listed columns.
///
/// Without a `columns` list the frame is returned unchanged, so selecting this
/// transform with its defaults never touches data.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleMissing;

impl Transform for HandleMissing {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("handle_missing", "Handle Missing Values")
            .with_description(
                "Drops rows with missing values or fills them with a constant, forward or backward fill.",
            )
            .with_default("strategy", json!("noop"))
            .with_default("fill_value", json!(null))
            .with_default("columns", json!(null))
            .with_default("limit", json!(null))
            .with_order(30)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let strategy = param_str(params, "strategy")?.unwrap_or("noop");
        if !matches!(strategy, "noop" | "drop" | "fill" | "ffill" | "bfill") {
            bail!("Unknown missing value strategy '{strategy}'");
        }

        let Some(requested) = param_string_list(params, "columns")? else {
            return Ok(df.clone());
        };
        let existing: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let targets: Vec<String> = requested
            .into_iter()
            .filter(|name| existing.contains(name))
            .collect();
        if targets.is_empty() {
            return Ok(df.clone());
        }

        match strategy {
            "drop" => df
                .drop_nulls(Some(targets.as_slice()))
                .context("Failed to drop rows with missing values"),
            "fill" => fill_constant(df, &targets, params.get("fill_value")),
            "ffill" => fill_with_strategy(df, &targets, FillNullStrategy::Forward(limit(params)?)),
            "bfill" => fill_with_strategy(df, &targets, FillNullStrategy::Backward(limit(params)?)),
            _ => Ok(df.clone()),
        }
    }
}

fn limit(params: &Params) -> Result<Option<IdxSize>> {
    param_u64(params, "limit")?
        .map(|l| IdxSize::try_from(l).context("Fill limit is too large"))
        .transpose()
}

fn fill_constant(
    df: &DataFrame,
    targets: &[String],
    value: Option<&serde_json::Value>,
) -> Result<DataFrame> {
    let fill = match value {
        None | Some(serde_json::Value::Null) => return Ok(df.clone()),
        Some(value) => json_literal(value)?,
    };

    let exprs: Vec<Expr> = targets
        .iter()
        .map(|name| col(name.as_str()).fill_null(fill.clone()).alias(name.as_str()))
        .collect();

    df.clone()
        .lazy()
        .with_columns(exprs)
        .collect()
        .context("Failed to fill missing values")
}

fn fill_with_strategy(
    df: &DataFrame,
    targets: &[String],
    strategy: FillNullStrategy,
) -> Result<DataFrame> {
    let mut out = df.clone();
    for name in targets {
        let filled = out
            .column(name)?
            .as_materialized_series()
            .fill_null(strategy)
            .with_context(|| format!("Failed to fill column '{name}'"))?;
        out.with_column(filled)?;
    }
    Ok(out)
}

/// Polars literal for a scalar JSON value
pub(crate) fn json_literal(value: &serde_json::Value) -> Result<Expr> {
    match value {
        serde_json::Value::Bool(b) => Ok(lit(*b)),
        serde_json::Value::String(s) => Ok(lit(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(lit(i))
            } else if let Some(f) = n.as_f64() {
                Ok(lit(f))
            } else {
                bail!("Unsupported numeric fill value {n}")
            }
        }
        serde_json::Value::Null => Ok(lit(NULL)),
        other => bail!("Fill value must be a scalar, got {other}"),
    }
}
