//! Declarative table operations used by extension manifests.
//!
//! A recipe is an ordered list of [`RecipeOp`]s applied through the lazy API and
//! collected once at the end. String fields may reference transform parameters:
//!
//! - a field that is exactly `"{name}"` takes the parameter's value as-is
//! - a list element that is exactly `"{name}"` is replaced by the parameter's items
//!   (a null parameter removes the element; a list holding only that element becomes null)
//! - `{name}` inside a longer string is replaced by the parameter's text form
//!
//! Unknown placeholders are left untouched.
//!
//! For column lists a missing (or null) list means every text column, while an
//! explicit empty list selects none.

use super::descriptor::Params;
use anyhow::{Context as _, Result, anyhow, bail};
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single recipe operation (tagged by `op`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RecipeOp {
    /// Drop the listed columns; missing ones are ignored
    DropColumns {
        #[serde(default, deserialize_with = "null_as_empty")]
        columns: Vec<String>,
    },

    /// Rename columns by old name -> new name
    RenameColumns { mapping: BTreeMap<String, String> },

    /// Trim leading and trailing whitespace
    TrimWhitespace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },

    /// Lowercase text
    Lowercase {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },

    /// Regex replacement on text columns
    RegexReplace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
        pattern: String,
        #[serde(default)]
        replacement: String,
    },

    /// Replace whole cell values (exact match) in text columns
    ReplaceValues {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
        mapping: BTreeMap<String, String>,
    },

    /// Cast columns, column name -> type name (`i64`, `f64`, `string`, `bool`, `datetime`)
    CastTypes { columns: BTreeMap<String, String> },

    /// Pull the first number out of text and store it as `f64`
    ExtractNumbers {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },

    /// Fill nulls in the listed columns with a scalar. Null value or no columns is a no-op.
    FillNull {
        #[serde(default, deserialize_with = "null_as_empty")]
        columns: Vec<String>,
        #[serde(default)]
        value: Value,
    },

    /// Drop rows with a null in any listed column, or in any column when no list is given
    DropNulls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RecipeOp {
    /// Checks that can run before any parameters are known
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RegexReplace { pattern, .. } if pattern.is_empty() => {
                bail!("regex_replace needs a non-empty pattern")
            }
            Self::CastTypes { columns } => {
                for type_str in columns.values().filter(|t| !t.contains('{')) {
                    parse_type_string(type_str)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A copy with `{param}` placeholders substituted
    pub fn bind(&self, params: &Params) -> Result<Self> {
        if params.is_empty() {
            return Ok(self.clone());
        }
        let raw = serde_json::to_value(self).context("Failed to serialise recipe operation")?;
        serde_json::from_value(substitute(raw, params))
            .context("Recipe operation is invalid after parameter substitution")
    }
}

fn placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('{')?.strip_suffix('}')?;
    let valid = !inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(inner)
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn substitute(value: Value, params: &Params) -> Value {
    match value {
        Value::String(s) => {
            if let Some(found) = placeholder(&s).and_then(|name| params.get(name)) {
                return found.clone();
            }
            let mut out = s;
            for (name, param) in params {
                let token = format!("{{{name}}}");
                if out.contains(&token) {
                    out = out.replace(&token, &text_form(param));
                }
            }
            Value::String(out)
        }
        Value::Array(items) => {
            if let [only] = items.as_slice()
                && only
                    .as_str()
                    .and_then(placeholder)
                    .and_then(|name| params.get(name))
                    .is_some_and(Value::is_null)
            {
                return Value::Null;
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let bound = item
                    .as_str()
                    .and_then(placeholder)
                    .and_then(|name| params.get(name));
                match bound {
                    Some(Value::Array(values)) => out.extend(values.iter().cloned()),
                    Some(Value::Null) => {}
                    Some(other) => out.push(other.clone()),
                    None => out.push(substitute(item, params)),
                }
            }
            Value::Array(out)
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute(v, params)))
                .collect(),
        ),
        other => other,
    }
}

/// Parse a recipe type name to a Polars `DataType`
pub(crate) fn parse_type_string(type_str: &str) -> Result<DataType> {
    match type_str.to_lowercase().as_str() {
        "i64" | "int" | "integer" | "numeric" => Ok(DataType::Int64),
        "f64" | "float" | "double" => Ok(DataType::Float64),
        "string" | "str" | "text" => Ok(DataType::String),
        "bool" | "boolean" => Ok(DataType::Boolean),
        "datetime" | "temporal" => Ok(DataType::Datetime(TimeUnit::Milliseconds, None)),
        _ => Err(anyhow!("Unknown type string: {type_str}")),
    }
}

/// Apply `ops` in order to a copy of `df`
pub fn apply_recipe(df: &DataFrame, ops: &[RecipeOp], params: &Params) -> Result<DataFrame> {
    let mut lf = df.clone().lazy();
    for op in ops {
        let bound = op.bind(params)?;
        lf = apply_op(&bound, lf)?;
    }
    lf.collect().context("Failed to evaluate recipe")
}

fn schema_of(lf: &mut LazyFrame) -> Result<SchemaRef> {
    lf.collect_schema().map_err(|e| anyhow!(e))
}

/// Requested text columns that exist, or every text column when no list is given
fn text_targets(schema: &Schema, requested: Option<&[String]>) -> Vec<String> {
    schema
        .iter()
        .filter(|(name, dtype)| {
            **dtype == DataType::String
                && requested.is_none_or(|cols| cols.iter().any(|r| r == name.as_str()))
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Map selected columns through `f`, keeping the rest and the column order
fn map_columns<F>(lf: LazyFrame, schema: &Schema, targets: &[String], f: F) -> LazyFrame
where
    F: Fn(Expr) -> Expr,
{
    let exprs: Vec<Expr> = schema
        .iter_names()
        .map(|name| {
            if targets.iter().any(|t| t == name.as_str()) {
                f(col(name.as_str())).alias(name.as_str())
            } else {
                col(name.as_str())
            }
        })
        .collect();
    lf.select(exprs)
}

fn apply_op(op: &RecipeOp, mut lf: LazyFrame) -> Result<LazyFrame> {
    let schema = schema_of(&mut lf)?;
    match op {
        RecipeOp::DropColumns { columns } => {
            let keep: Vec<Expr> = schema
                .iter_names()
                .filter(|name| !columns.iter().any(|c| c == name.as_str()))
                .map(|name| col(name.as_str()))
                .collect();
            Ok(lf.select(keep))
        }

        RecipeOp::RenameColumns { mapping } => {
            let exprs: Vec<Expr> = schema
                .iter_names()
                .map(|name| match mapping.get(name.as_str()) {
                    Some(new_name) => col(name.as_str()).alias(new_name.as_str()),
                    None => col(name.as_str()),
                })
                .collect();
            Ok(lf.select(exprs))
        }

        RecipeOp::TrimWhitespace { columns } => {
            let targets = text_targets(&schema, columns.as_deref());
            Ok(map_columns(lf, &schema, &targets, |e| {
                e.str().strip_chars(lit(NULL))
            }))
        }

        RecipeOp::Lowercase { columns } => {
            let targets = text_targets(&schema, columns.as_deref());
            Ok(map_columns(lf, &schema, &targets, |e| e.str().to_lowercase()))
        }

        RecipeOp::RegexReplace {
            columns,
            pattern,
            replacement,
        } => {
            let targets = text_targets(&schema, columns.as_deref());
            Ok(map_columns(lf, &schema, &targets, |e| {
                e.str()
                    .replace_all(lit(pattern.as_str()), lit(replacement.as_str()), false)
            }))
        }

        RecipeOp::ReplaceValues { columns, mapping } => {
            let targets = text_targets(&schema, columns.as_deref());
            Ok(map_columns(lf, &schema, &targets, |e| {
                mapping.iter().fold(e.clone(), |acc, (from, to)| {
                    when(e.clone().eq(lit(from.as_str())))
                        .then(lit(to.as_str()))
                        .otherwise(acc)
                })
            }))
        }

        RecipeOp::CastTypes { columns } => {
            let exprs: Vec<Expr> = schema
                .iter_names()
                .map(|name| match columns.get(name.as_str()) {
                    Some(type_str) => {
                        let dtype = parse_type_string(type_str)?;
                        Ok(col(name.as_str()).cast(dtype))
                    }
                    None => Ok(col(name.as_str())),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(lf.select(exprs))
        }

        RecipeOp::ExtractNumbers { columns } => {
            let targets = text_targets(&schema, columns.as_deref());
            Ok(map_columns(lf, &schema, &targets, |e| {
                e.str()
                    .extract(lit(r"(-?\d+\.?\d*)"), 1)
                    .cast(DataType::Float64)
            }))
        }

        RecipeOp::FillNull { columns, value } => {
            if value.is_null() || columns.is_empty() {
                return Ok(lf);
            }
            let fill = crate::transforms::builtin::missing::json_literal(value)?;
            let targets: Vec<String> = columns
                .iter()
                .filter(|c| schema.contains(c.as_str()))
                .cloned()
                .collect();
            Ok(map_columns(lf, &schema, &targets, |e| e.fill_null(fill.clone())))
        }

        RecipeOp::DropNulls { columns } => {
            let checks = schema
                .iter_names()
                .filter(|name| {
                    columns
                        .as_deref()
                        .is_none_or(|cols| cols.iter().any(|c| c == name.as_str()))
                })
                .map(|name| col(name.as_str()).is_not_null())
                .reduce(|acc, next| acc.and(next));
            Ok(match checks {
                Some(predicate) => lf.filter(predicate),
                None => lf,
            })
        }
    }
}
