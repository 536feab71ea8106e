//! JSON ingestion implementation.
//!
//! Row selection follows a fixed ladder, first match wins:
//! - A top-level array: `[{"a":1}, {"a":2}]` → one row per element
//! - An object with an array-valued field: `{"people":[...]}` → the first such field's elements
//! - Any other object: `{"a":1}` → the object itself is the single row
//! - A bare scalar: `42` → `{"data": 42}`
//!
//! Array elements that are not objects are wrapped the same way as a bare scalar.

use crate::error::{ParseError, ParseResult};
use crate::types::{Fields, Value};

use super::encoding;
use super::unified::ParsedFile;

/// Field name used when a non-object value has to become a row.
pub const SCALAR_FIELD: &str = "data";

/// Parse raw JSON bytes into rows.
pub fn parse_json(bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    let (text, enc) = encoding::resolve(bytes);
    tracing::debug!(encoding = enc.name(), bytes = bytes.len(), "decoded json input");
    parse_json_from_str(&text, max_rows)
}

/// Parse JSON from an in-memory string.
pub fn parse_json_from_str(input: &str, max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    if input.trim().is_empty() {
        return Err(ParseError::Malformed {
            message: "json input is empty".to_string(),
        });
    }

    let root: serde_json::Value = serde_json::from_str(input)?;
    let items = select_rows(root);
    let total_rows = items.len();

    let rows = items
        .into_iter()
        .take(max_rows.unwrap_or(usize::MAX))
        .map(into_row)
        .collect();

    Ok(ParsedFile { rows, total_rows })
}

fn select_rows(root: serde_json::Value) -> Vec<serde_json::Value> {
    match root {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => {
            let array_key = map
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone());
            match array_key.and_then(|k| map.remove(&k)) {
                Some(serde_json::Value::Array(items)) => items,
                _ => vec![serde_json::Value::Object(map)],
            }
        }
        scalar => vec![scalar],
    }
}

fn into_row(v: serde_json::Value) -> Fields {
    match v {
        serde_json::Value::Object(map) => Fields::from(map),
        other => {
            let mut row = Fields::with_capacity(1);
            row.insert(SCALAR_FIELD, Value::from(other));
            row
        }
    }
}
