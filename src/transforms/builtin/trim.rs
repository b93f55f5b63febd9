use super::{map_text_column, param_string_list, target_text_columns};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::Result;
use polars::prelude::*;

/// Strips leading and trailing whitespace from text columns, keeping inner spacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimSpaces;

impl Transform for TrimSpaces {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("trim_spaces", "Trim Spaces")
            .with_description(
                "Removes leading and trailing whitespace from every text column; inner spaces are kept.",
            )
            .with_order(18)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let columns = target_text_columns(df, param_string_list(params, "columns")?);
        let mut out = df.clone();
        for name in &columns {
            map_text_column(&mut out, name, |value| value.trim().to_owned())?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_text_columns_only() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::new("name".into(), [Some("  Alice  "), Some("Bob\t"), None]),
            Column::new("age".into(), [25i64, 30, 35]),
        ])?;

        let out = TrimSpaces.apply(&df, &Params::new())?;
        let names = out.column("name")?.as_materialized_series().str()?.clone();
        assert_eq!(names.get(0), Some("Alice"));
        assert_eq!(names.get(1), Some("Bob"));
        assert_eq!(names.get(2), None);
        assert!(out.column("age")?.dtype().is_integer());

        let original = df.column("name")?.as_materialized_series().str()?.clone();
        assert_eq!(original.get(0), Some("  Alice  "));
        Ok(())
    }
}
