use super::{map_text_column, param_bool, param_str, param_string_list, target_text_columns};
use crate::transforms::descriptor::{Params, Transform, TransformMeta};
use anyhow::{Result, bail};
use polars::prelude::*;
use serde_json::json;

/// General purpose text clean-up for free-form string columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalize;

impl Transform for TextNormalize {
    fn meta(&self) -> TransformMeta {
        TransformMeta::new("text_normalize", "Text Normalize")
            .with_description(
                "Replaces non-breaking spaces, removes zero-width characters, straightens smart quotes and collapses whitespace.",
            )
            .with_default("columns", json!(null))
            .with_default("replace_nbsp", json!(true))
            .with_default("remove_zero_width", json!(true))
            .with_default("normalize_quotes", json!(true))
            .with_default("collapse_whitespace", json!(true))
            .with_default("case", json!("none"))
            .with_order(60)
    }

    fn apply(&self, df: &DataFrame, params: &Params) -> Result<DataFrame> {
        let options = TextOptions {
            replace_nbsp: param_bool(params, "replace_nbsp", true)?,
            remove_zero_width: param_bool(params, "remove_zero_width", true)?,
            normalize_quotes: param_bool(params, "normalize_quotes", true)?,
            collapse_whitespace: param_bool(params, "collapse_whitespace", true)?,
            case: match param_str(params, "case")?.unwrap_or("none") {
                "none" => CaseFold::None,
                "lower" => CaseFold::Lower,
                "upper" => CaseFold::Upper,
                other => bail!("Unknown text case '{other}' (expected none, lower or upper)"),
            },
        };

        let columns = target_text_columns(df, param_string_list(params, "columns")?);
        let mut out = df.clone();
        for name in &columns {
            map_text_column(&mut out, name, |value| normalize_text(value, &options))?;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
enum CaseFold {
    None,
    Lower,
    Upper,
}

struct TextOptions {
    replace_nbsp: bool,
    remove_zero_width: bool,
    normalize_quotes: bool,
    collapse_whitespace: bool,
    case: CaseFold,
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

fn ascii_quote(c: char) -> Option<char> {
    match c {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Some('"'),
        '\u{2018}' | '\u{2019}' | '\u{00B4}' | '\u{02BC}' | '\u{2032}' => Some('\''),
        '\u{2013}' | '\u{2014}' => Some('-'),
        _ => None,
    }
}

fn normalize_text(value: &str, options: &TextOptions) -> String {
    let mut text: String = value
        .chars()
        .filter(|c| !(options.remove_zero_width && is_zero_width(*c)))
        .map(|c| match c {
            '\u{00A0}' if options.replace_nbsp => ' ',
            c if options.normalize_quotes => ascii_quote(c).unwrap_or(c),
            c => c,
        })
        .collect();

    text = if options.collapse_whitespace {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text.trim().to_owned()
    };

    match options.case {
        CaseFold::None => text,
        CaseFold::Lower => text.to_lowercase(),
        CaseFold::Upper => text.to_uppercase(),
    }
}
