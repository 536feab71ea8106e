//! CSV ingestion implementation.

use crate::error::{ParseError, ParseResult};
use crate::types::Fields;

use super::cells::{header_names, infer_scalar};
use super::encoding;
use super::unified::ParsedFile;

/// Parse raw CSV bytes into header-keyed rows.
///
/// Rules:
///
/// - Bytes are decoded with [`encoding::resolve`].
/// - The first record is the header; every later record becomes one row keyed by it.
/// - Every record must have as many fields as the header, otherwise the whole file fails.
/// - Cells are typed with per-cell inference; absent-value markers become `Null`.
/// - `max_rows` truncates the returned rows only; `total_rows` counts every data record.
pub fn parse_csv(bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    let (text, enc) = encoding::resolve(bytes);
    tracing::debug!(encoding = enc.name(), bytes = bytes.len(), "decoded csv input");

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());
    parse_csv_from_reader(&mut rdr, max_rows)
}

/// Parse CSV data from an existing CSV reader (which must be configured with headers).
pub fn parse_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    max_rows: Option<usize>,
) -> ParseResult<ParsedFile> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(ParseError::Malformed {
            message: "csv input has no header row".to_string(),
        });
    }
    let names = header_names(headers.iter());

    let limit = max_rows.unwrap_or(usize::MAX);
    let mut rows: Vec<Fields> = Vec::new();
    let mut total_rows = 0usize;
    for result in rdr.records() {
        // Unequal field counts surface here as `csv::ErrorKind::UnequalLengths`.
        let record = result?;
        total_rows += 1;
        if rows.len() >= limit {
            continue;
        }

        let mut row = Fields::with_capacity(names.len());
        for (name, raw) in names.iter().zip(record.iter()) {
            row.push(name.as_str(), infer_scalar(raw));
        }
        rows.push(row);
    }

    Ok(ParsedFile { rows, total_rows })
}
