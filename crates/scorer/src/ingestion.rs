use anyhow::{Context, Result};
use common::types::RawTransaction;
use serde_json::Value;

/// The input is not a JSON array of objects. Individual bad records are not
/// an `InputError`; they are dropped during normalization.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON array of transaction records, got {0}")]
    NotAnArray(&'static str),
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn parse_transactions(s: &str) -> std::result::Result<Vec<RawTransaction>, InputError> {
    let value: Value = serde_json::from_str(s)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(InputError::NotAnArray(kind_of(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(InputError::NotAnObject { index });
            }
            Ok(serde_json::from_value(item)?)
        })
        .collect()
}

pub fn load_transactions(path: &str) -> Result<Vec<RawTransaction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transactions file: {path}"))?;
    let records = parse_transactions(&content)
        .with_context(|| format!("failed to decode transactions file: {path}"))?;
    tracing::info!(path, records = records.len(), "transactions loaded");
    Ok(records)
}
