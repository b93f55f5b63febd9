//! Built-in transforms compiled into the crate.
//!
//! Each submodule exposes one unit type implementing [`Transform`]. Parameter
//! helpers shared by all of them live here so the units stay small.

pub mod convert;
pub mod duplicates;
pub mod headers;
pub mod missing;
pub mod text;
pub mod trim;

use super::descriptor::{Params, Transform};
use anyhow::{Result, bail};
use polars::prelude::*;
use std::sync::Arc;

pub use convert::ConvertTypes;
pub use duplicates::DropDuplicates;
pub use headers::StandardizeHeaders;
pub use missing::HandleMissing;
pub use text::TextNormalize;
pub use trim::TrimSpaces;

/// The statically linked built-in set, in discovery order
pub fn builtin_transforms() -> Vec<Arc<dyn Transform>> {
    vec![
        Arc::new(ConvertTypes),
        Arc::new(DropDuplicates),
        Arc::new(HandleMissing),
        Arc::new(StandardizeHeaders),
        Arc::new(TextNormalize),
        Arc::new(TrimSpaces),
    ]
}

/// String parameter, `None` when missing or null
pub(crate) fn param_str<'a>(params: &'a Params, key: &str) -> Result<Option<&'a str>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => bail!("Parameter '{key}' must be a string, got {other}"),
    }
}

pub(crate) fn param_bool(params: &Params, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(other) => bail!("Parameter '{key}' must be a boolean, got {other}"),
    }
}

pub(crate) fn param_f64(params: &Params, key: &str, default: f64) -> Result<f64> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("Parameter '{key}' must be a number, got {value}")),
    }
}

pub(crate) fn param_u64(params: &Params, key: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            anyhow::anyhow!("Parameter '{key}' must be a non-negative integer, got {value}")
        }),
    }
}

/// List of strings; a single string is accepted as a one-element list
pub(crate) fn param_string_list(params: &Params, key: &str) -> Result<Option<Vec<String>>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    anyhow::anyhow!("Parameter '{key}' must contain only strings, got {item}")
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(other) => bail!("Parameter '{key}' must be a list of column names, got {other}"),
    }
}

/// Names of all string-typed columns, in frame order
pub(crate) fn text_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|column| column.dtype() == &DataType::String)
        .map(|column| column.name().to_string())
        .collect()
}

/// Requested columns restricted to string columns that exist, or every text column
pub(crate) fn target_text_columns(df: &DataFrame, requested: Option<Vec<String>>) -> Vec<String> {
    let available = text_columns(df);
    match requested {
        Some(columns) => columns
            .into_iter()
            .filter(|name| available.contains(name))
            .collect(),
        None => available,
    }
}

/// Replace a string column with `f` applied to every non-null value
pub(crate) fn map_text_column<F>(df: &mut DataFrame, name: &str, f: F) -> PolarsResult<()>
where
    F: Fn(&str) -> String,
{
    let replaced = {
        let series = df.column(name)?.as_materialized_series();
        let values: Vec<Option<String>> = series.str()?.into_iter().map(|v| v.map(&f)).collect();
        Series::new(series.name().clone(), values)
    };
    df.with_column(replaced)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::descriptor::TransformMeta;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_keys_are_unique() {
        let metas: Vec<TransformMeta> = builtin_transforms().iter().map(|t| t.meta()).collect();
        let keys: HashSet<&str> = metas.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys.len(), metas.len());
        assert!(metas.iter().all(|m| !m.key.is_empty() && !m.name.is_empty()));
    }

    #[test]
    fn test_param_string_list_accepts_single_string() -> Result<()> {
        let mut params = Params::new();
        params.insert("columns".to_owned(), json!("name"));
        assert_eq!(
            param_string_list(&params, "columns")?,
            Some(vec!["name".to_owned()])
        );

        params.insert("columns".to_owned(), json!([1, 2]));
        assert!(param_string_list(&params, "columns").is_err());
        Ok(())
    }

    #[test]
    fn test_target_text_columns_skips_numeric() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::new("name".into(), ["a", "b"]),
            Column::new("age".into(), [1i64, 2]),
        ])?;
        assert_eq!(target_text_columns(&df, None), vec!["name".to_owned()]);
        assert!(target_text_columns(&df, Some(vec!["age".to_owned()])).is_empty());
        Ok(())
    }
}
