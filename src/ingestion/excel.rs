#![cfg(feature = "excel")]

use std::io::Cursor;

use calamine::{Data, DataType, Range, Reader, open_workbook_auto_from_rs};

use crate::error::{ParseError, ParseResult};
use crate::types::{Fields, Value};

use super::cells::{header_names, infer_scalar};
use super::unified::ParsedFile;

/// Parse an Excel document (`.xlsx`, `.xls`, ...) held in memory.
///
/// Behavior:
/// - Uses the first sheet in the workbook; other sheets are ignored
/// - Detects the first non-empty row as the header row
/// - Every later row becomes one row keyed by the header; missing cells are `Null`
/// - `max_rows` truncates the returned rows only; `total_rows` counts every row below the header
pub fn parse_excel(bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Malformed {
            message: "workbook has no sheets".to_string(),
        })??;

    parse_sheet_range(&range, max_rows)
}

fn parse_sheet_range(range: &Range<Data>, max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    let header_row_idx = range
        .rows()
        .position(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .ok_or_else(|| ParseError::Malformed {
            message: "sheet has no non-empty rows (no header row found)".to_string(),
        })?;

    let header_cells: Vec<String> = range
        .rows()
        .nth(header_row_idx)
        .map(|row| row.iter().map(cell_to_header_string).collect())
        .unwrap_or_default();
    let names = header_names(header_cells.iter().map(String::as_str));

    let limit = max_rows.unwrap_or(usize::MAX);
    let mut rows: Vec<Fields> = Vec::new();
    let mut total_rows = 0usize;
    for row in range.rows().skip(header_row_idx + 1) {
        total_rows += 1;
        if rows.len() >= limit {
            continue;
        }

        let mut out = Fields::with_capacity(names.len());
        for (col, name) in names.iter().enumerate() {
            let cell = row.get(col).unwrap_or(&Data::Empty);
            out.push(name.as_str(), convert_cell(cell));
        }
        rows.push(out);
    }

    Ok(ParsedFile { rows, total_rows })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int64(*f as i64)
            } else {
                Value::Float64(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        // Text cells go through the same NA handling as CSV cells.
        Data::String(s) => match infer_scalar(s) {
            Value::Null => Value::Null,
            _ => Value::Utf8(s.clone()),
        },
        Data::DateTime(_) => match c.as_datetime() {
            Some(dt) => Value::Utf8(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Utf8(c.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
