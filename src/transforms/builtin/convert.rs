use super::{param_bool, param_f64, param_string_list, target_text_columns};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::{Result, bail};
use polars::prelude::*;
use serde_json::json;

/// Detects numbers stored as text and converts those columns to numeric dtypes.
///
/// A column is converted when the share of rows that parse as a number after
/// cleaning reaches `numeric_threshold`. Columns whose parsed values are all
/// whole numbers become `Int64`, the rest `Float64`. With `coerce` disabled a
/// single unparseable value keeps the column as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertTypes;

const DEFAULT_THRESHOLD: f64 = 0.7;

impl Transform for ConvertTypes {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("convert_types", "Convert Types")
            .with_description(
                "Detects numeric columns stored as text and converts them to proper numeric types.",
            )
            .with_default("columns", json!(null))
            .with_default("numeric_threshold", json!(DEFAULT_THRESHOLD))
            .with_default("strip_characters", json!([",", " ", "$", "TL", "€", "%"]))
            .with_default("coerce", json!(true))
            .with_order(50)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let threshold = param_f64(params, "numeric_threshold", DEFAULT_THRESHOLD)?;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("numeric_threshold must be between 0 and 1, got {threshold}");
        }
        let strip = param_string_list(params, "strip_characters")?.unwrap_or_default();
        let coerce = param_bool(params, "coerce", true)?;
        let columns = target_text_columns(df, param_string_list(params, "columns")?);

        let mut out = df.clone();
        if out.height() == 0 {
            return Ok(out);
        }

        for name in &columns {
            let parsed: Vec<Option<f64>> = {
                let values = out.column(name)?.as_materialized_series().str()?.clone();
                values
                    .into_iter()
                    .map(|v| v.and_then(|raw| parse_number(raw, &strip)))
                    .collect()
            };

            let present = df.column(name)?.len() - df.column(name)?.null_count();
            let parsed_count = parsed.iter().filter(|v| v.is_some()).count();
            if !coerce && parsed_count < present {
                continue;
            }
            let ratio = parsed_count as f64 / out.height() as f64;
            if ratio < threshold {
                continue;
            }

            let converted = if parsed.iter().flatten().all(|v| is_whole(*v)) {
                let ints: Vec<Option<i64>> = parsed.iter().map(|v| v.map(|f| f as i64)).collect();
                Series::new(name.as_str().into(), ints)
            } else {
                Series::new(name.as_str().into(), parsed)
            };
            tracing::debug!(
                column = %name,
                ratio,
                dtype = %converted.dtype(),
                "Converted text column"
            );
            out.with_column(converted)?;
        }

        Ok(out)
    }
}

/// Removes configured tokens, keeps only characters that can appear in a number, then parses.
fn parse_number(raw: &str, strip: &[String]) -> Option<f64> {
    let mut cleaned = raw.trim().to_owned();
    for token in strip {
        if !token.is_empty() {
            cleaned = cleaned.replace(token.as_str(), "");
        }
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_whole(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_strips_currency() {
        let strip: Vec<String> = vec![",".into(), " ".into(), "$".into(), "TL".into()];
        assert_eq!(parse_number(" 1,250 TL ", &strip), Some(1250.0));
        assert_eq!(parse_number("$3.5", &strip), Some(3.5));
        assert_eq!(parse_number("n/a", &strip), None);
    }

    #[test]
    fn test_converts_mostly_numeric_column() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::new("price".into(), ["1,000", "2,500", "350", "unknown"]),
            Column::new("city".into(), ["Izmir", "Ankara", "Bursa", "Adana"]),
        ])?;

        let out = ConvertTypes.apply(&df, &ConvertTypes.meta().defaults)?;
        assert_eq!(out.column("price")?.dtype(), &DataType::Int64);
        assert_eq!(out.column("city")?.dtype(), &DataType::String);
        let prices: Vec<Option<i64>> = out
            .column("price")?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .collect();
        assert_eq!(prices, vec![Some(1000), Some(2500), Some(350), None]);
        Ok(())
    }

    #[test]
    fn test_threshold_and_coerce() -> Result<()> {
        let df = DataFrame::new(vec![Column::new("mixed".into(), ["1.5", "x", "y", "2"])])?;

        let out = ConvertTypes.apply(&df, &ConvertTypes.meta().defaults)?;
        assert_eq!(out.column("mixed")?.dtype(), &DataType::String);

        let mut params = ConvertTypes.meta().defaults;
        params.insert("numeric_threshold".to_owned(), json!(0.5));
        let out = ConvertTypes.apply(&df, &params)?;
        assert_eq!(out.column("mixed")?.dtype(), &DataType::Float64);

        params.insert("coerce".to_owned(), json!(false));
        let out = ConvertTypes.apply(&df, &params)?;
        assert_eq!(out.column("mixed")?.dtype(), &DataType::String);
        Ok(())
    }
}
