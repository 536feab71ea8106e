//! Header cleanup and scalar inference shared by the tabular parsers.

use std::collections::HashSet;

use crate::types::Value;

/// Spellings treated as an absent value in text cells.
const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Turn raw header cells into unique, non-empty field names.
///
/// - a leading BOM on the first header is dropped
/// - blank headers become `Unnamed: <col>`
/// - repeated names get `.1`, `.2`, ... suffixes in order of appearance
pub(crate) fn header_names<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for (col, cell) in raw.into_iter().enumerate() {
        let cell = if col == 0 { cell.trim_start_matches('\u{feff}') } else { cell };
        let base = if cell.trim().is_empty() {
            format!("Unnamed: {col}")
        } else {
            cell.to_string()
        };

        let mut name = base.clone();
        let mut dup = 0usize;
        while seen.contains(&name) {
            dup += 1;
            name = format!("{base}.{dup}");
        }
        seen.insert(name.clone());
        out.push(name);
    }

    out
}

/// Infer a scalar from one text cell.
///
/// NA markers (after trimming) become [`Value::Null`]; integers, floats and `true`/`false`
/// are typed; anything else is kept verbatim.
pub(crate) fn infer_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if NA_MARKERS.contains(&trimmed) {
        return Value::Null;
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int64(i);
    }
    if looks_numeric(trimmed) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float64(f);
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    Value::Utf8(raw.to_string())
}

// Rust's float parser also accepts "inf"/"infinity"; keep those as text.
fn looks_numeric(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
}
