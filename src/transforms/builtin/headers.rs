use super::{param_bool, param_str, param_u64};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::{Result, bail};
use polars::prelude::*;
use serde_json::json;
use std::collections::HashSet;

/// Lowercases column names, replaces whitespace runs and strips special characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardizeHeaders;

impl Transform for StandardizeHeaders {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("standardize_headers", "Standardize Headers")
            .with_description(
                "Lowercases column names, turns whitespace into underscores and removes special characters.",
            )
            .with_default("case", json!("lower"))
            .with_default("whitespace_replacement", json!("_"))
            .with_default("allow_unicode", json!(false))
            .with_default("max_length", json!(128))
            .with_order(10)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let options = HeaderOptions {
            case: param_str(params, "case")?.unwrap_or("lower").to_owned(),
            whitespace_replacement: param_str(params, "whitespace_replacement")?
                .unwrap_or("_")
                .to_owned(),
            allow_unicode: param_bool(params, "allow_unicode", false)?,
            max_length: param_u64(params, "max_length")?.unwrap_or(128) as usize,
        };
        if !matches!(options.case.as_str(), "lower" | "upper" | "preserve") {
            bail!("Unknown header case '{}'", options.case);
        }

        let mut seen = HashSet::new();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| unique_name(normalise_header(name.as_str(), &options), &mut seen))
            .collect();

        let mut out = df.clone();
        out.set_column_names(names.iter().map(String::as_str))?;
        Ok(out)
    }
}

struct HeaderOptions {
    case: String,
    whitespace_replacement: String,
    allow_unicode: bool,
    max_length: usize,
}

fn normalise_header(raw: &str, options: &HeaderOptions) -> String {
    let cased = match options.case.as_str() {
        "lower" => raw.trim().to_lowercase(),
        "upper" => raw.trim().to_uppercase(),
        _ => raw.trim().to_owned(),
    };

    let mut collapsed = String::with_capacity(cased.len());
    let mut in_whitespace = false;
    for c in cased.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                collapsed.push_str(&options.whitespace_replacement);
            }
            in_whitespace = true;
        } else {
            collapsed.push(c);
            in_whitespace = false;
        }
    }

    let cleaned: String = collapsed
        .chars()
        .filter(|c| {
            *c == '_'
                || c.is_ascii_alphanumeric()
                || (options.allow_unicode && c.is_alphanumeric())
        })
        .take(options.max_length)
        .collect();

    if cleaned.is_empty() {
        "column".to_owned()
    } else {
        cleaned
    }
}

// Polars rejects duplicate column names, so collisions get a numeric suffix.
fn unique_name(candidate: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(candidate.clone()) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let next = format!("{candidate}_{n}");
        if seen.insert(next.clone()) {
            return next;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_normalised() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::new(" Customer  Name ".into(), ["a"]),
            Column::new("Total ($)".into(), [1i64]),
            Column::new("%%".into(), [2i64]),
        ])?;
        let out = StandardizeHeaders.apply(&df, &StandardizeHeaders.meta().defaults)?;
        let names: Vec<String> = out.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["customer_name", "total_", "column"]);
        // input untouched
        assert_eq!(df.get_column_names()[0].as_str(), " Customer  Name ");
        Ok(())
    }

    #[test]
    fn test_colliding_headers_get_suffix() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::new("Name".into(), ["a"]),
            Column::new("name ".into(), ["b"]),
        ])?;
        let out = StandardizeHeaders.apply(&df, &Params::new())?;
        let names: Vec<String> = out.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["name", "name_2"]);
        Ok(())
    }

    #[test]
    fn test_unknown_case_fails() {
        let df = DataFrame::empty();
        let mut params = Params::new();
        params.insert("case".to_owned(), json!("sideways"));
        assert!(StandardizeHeaders.apply(&df, &params).is_err());
    }
}
