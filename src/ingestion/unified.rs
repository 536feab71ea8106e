//! Format dispatch.
//!
//! [`IngestionFormat::from_extension`] maps a declared extension to one of the four parsers and
//! [`IngestionFormat::parse`] runs it. Every format goes through this single path.

use std::fmt;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult, ParseResult};
use crate::types::Fields;

use super::{csv, json, text};

/// Output of a format parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    /// Normalized rows in input order (possibly truncated by `max_rows`).
    pub rows: Vec<Fields>,
    /// Row count of the whole input, regardless of truncation.
    pub total_rows: usize,
}

impl ParsedFile {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Supported ingestion formats, one per parser variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionFormat {
    /// Delimited table with a header row (`.csv`).
    Csv,
    /// Spreadsheet, first sheet only (`.xlsx`, `.xls`).
    Excel,
    /// Structured object (`.json`).
    Json,
    /// Line-oriented text (`.txt`).
    Text,
}

/// Extensions accepted by [`IngestionFormat::from_extension`], without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "json", "txt"];

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive, with or without a
    /// leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Excel),
            "json" => Some(Self::Json),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// Run this format's parser over raw bytes.
    pub fn parse(self, bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
        match self {
            Self::Csv => csv::parse_csv(bytes, max_rows),
            Self::Excel => parse_excel_dispatch(bytes, max_rows),
            Self::Json => json::parse_json(bytes, max_rows),
            Self::Text => text::parse_text(bytes, max_rows),
        }
    }
}

impl fmt::Display for IngestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Json => "json",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Lower-case extension of `filename` without the dot, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
}

/// Select the parser for a declared filename.
///
/// Fails with [`IngestionError::Validation`] when the name has no extension or the extension
/// is not supported.
pub fn select_format(filename: &str) -> IngestionResult<(IngestionFormat, String)> {
    let ext = extension_of(filename).ok_or_else(|| {
        IngestionError::validation(format!("cannot infer format: '{filename}' has no extension"))
    })?;

    match IngestionFormat::from_extension(&ext) {
        Some(format) => Ok((format, ext)),
        None => Err(IngestionError::validation(format!(
            "unsupported file type '.{ext}', supported types: {}",
            SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn parse_excel_dispatch(bytes: &[u8], max_rows: Option<usize>) -> ParseResult<ParsedFile> {
    #[cfg(feature = "excel")]
    {
        super::excel::parse_excel(bytes, max_rows)
    }

    #[cfg(not(feature = "excel"))]
    {
        // Avoid unused warnings when the feature is off.
        let _ = (bytes, max_rows);
        Err(crate::error::ParseError::Malformed {
            message: "excel ingestion not enabled (enable cargo feature 'excel')".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_extension_is_case_insensitive() {
        assert_eq!(IngestionFormat::from_extension("CSV"), Some(IngestionFormat::Csv));
        assert_eq!(IngestionFormat::from_extension(".Xlsx"), Some(IngestionFormat::Excel));
        assert_eq!(IngestionFormat::from_extension("xls"), Some(IngestionFormat::Excel));
        assert_eq!(IngestionFormat::from_extension("Json"), Some(IngestionFormat::Json));
        assert_eq!(IngestionFormat::from_extension("TXT"), Some(IngestionFormat::Text));
        assert_eq!(IngestionFormat::from_extension("parquet"), None);
    }

    #[test]
    fn select_format_rejects_unknown_and_missing_extensions() {
        let err = select_format("setup.exe").unwrap_err();
        assert!(err.to_string().contains("unsupported file type '.exe'"));

        let err = select_format("README").unwrap_err();
        assert!(err.to_string().contains("has no extension"));

        let (format, ext) = select_format("Report.Final.CSV").unwrap();
        assert_eq!(format, IngestionFormat::Csv);
        assert_eq!(ext, "csv");
    }
}
