//! Plain-text ingestion: one row per non-empty line.

use crate::error::ParseResult;
use crate::types::{Fields, Value};

use super::encoding;
use super::unified::ParsedFile;

/// Field holding the trimmed line text.
pub const LINE_FIELD: &str = "line";
/// Field holding the 1-based line number in the original input.
pub const LINE_NUMBER_FIELD: &str = "lineNumber";

/// Parse raw text bytes into `{line, lineNumber}` rows.
///
/// Blank lines produce no row but still advance the line number, and `total_rows` counts
/// them. A trailing newline does not start an extra line.
pub fn parse_text(bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    let (text, enc) = encoding::resolve(bytes);
    tracing::debug!(encoding = enc.name(), bytes = bytes.len(), "decoded text input");
    Ok(parse_text_from_str(&text, max_rows))
}

/// Split an in-memory string into line rows.
pub fn parse_text_from_str(input: &str, max_rows: Option<usize>) -> ParsedFile {
    let limit = max_rows.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    let mut total_rows = 0usize;

    for (idx0, line) in split_lines(input).enumerate() {
        total_rows += 1;
        let line = line.trim();
        if line.is_empty() || rows.len() >= limit {
            continue;
        }

        let mut row = Fields::with_capacity(2);
        row.insert(LINE_FIELD, line);
        row.insert(LINE_NUMBER_FIELD, Value::Int64(idx0 as i64 + 1));
        rows.push(row);
    }

    ParsedFile { rows, total_rows }
}

/// Split on `\r\n`, `\n` or a lone `\r`. A trailing terminator does not start an extra line.
fn split_lines(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let Some(pos) = rest.find(['\r', '\n']) else {
            return Some(std::mem::take(&mut rest));
        };
        let line = &rest[..pos];
        let width = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + width..];
        Some(line)
    })
}
