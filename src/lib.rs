//! `rust-data-ingest` turns uploaded data files into schema-free normalized rows and persists
//! them with per-file progress tracking.
//!
//! The primary entrypoint is [`pipeline::Ingestor`]. Its [`ingest`](pipeline::Ingestor::ingest)
//! call picks a parser from the declared file extension, stores the raw bytes, parses, and writes
//! every row under a single transaction so a file's rows appear all at once or not at all.
//!
//! ## What you can ingest
//!
//! **File formats (selected by extension, case-insensitive):**
//!
//! - **CSV**: `.csv` (header row required; field-count mismatches fail the file)
//! - **Excel/workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, first sheet only
//! - **JSON**: `.json` (top-level array, first array-valued field, single object, or scalar)
//! - **Plain text**: `.txt`, one row per non-empty line
//!
//! Input bytes are decoded with the first of UTF-8, GBK, Big5 and windows-1252 that accepts the
//! whole buffer (see [`ingestion::encoding`]). GBK accepts all Big5 byte pairs, so Big5 files
//! decode without error but are not recovered as Big5 text.
//!
//! **Row values:**
//!
//! Every row is an ordered [`types::Fields`] map of [`types::Value`]s. Empty cells and the usual
//! NA spellings (`NA`, `N/A`, `NULL`, `NaN`, ...) map to [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```rust
//! use rust_data_ingest::pipeline::{IngestionOptions, Ingestor};
//! use rust_data_ingest::storage::{MemoryFileStore, MemoryStore};
//! use rust_data_ingest::types::{FileStatus, Value};
//!
//! # fn main() -> Result<(), rust_data_ingest::IngestionError> {
//! let ingestor = Ingestor::new(MemoryStore::new(), MemoryFileStore::new(), IngestionOptions::default());
//!
//! let result = ingestor.ingest(b"id,name\n1,Ada\n2,Grace\n", "people.csv")?;
//! assert_eq!(result.status, FileStatus::Completed);
//! assert_eq!(result.imported_rows, 2);
//!
//! let page = ingestor.rows(&result.file_id, 0, 20)?;
//! assert_eq!(page.items[1].fields.get("name"), Some(&Value::Utf8("Grace".to_string())));
//! assert_eq!(ingestor.progress(&result.file_id)?.percent(), 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! Parse failures are not errors of the call: the upload is recorded as `failed` and the
//! message says why.
//!
//! ```rust
//! # use rust_data_ingest::pipeline::{IngestionOptions, Ingestor};
//! # use rust_data_ingest::storage::{MemoryFileStore, MemoryStore};
//! # use rust_data_ingest::types::FileStatus;
//! # fn main() -> Result<(), rust_data_ingest::IngestionError> {
//! # let ingestor = Ingestor::new(MemoryStore::new(), MemoryFileStore::new(), IngestionOptions::default());
//! let result = ingestor.ingest(b"{not json", "broken.json")?;
//! assert_eq!(result.status, FileStatus::Failed);
//! assert!(result.error.is_some());
//!
//! // Unsupported extensions are rejected before anything is stored.
//! assert!(ingestor.ingest(b"MZ", "setup.exe").is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Disk + SQLite
//!
//! With the default `sqlite` feature, [`pipeline::Ingestor::open`] builds a pipeline from an
//! [`config::IngestConfig`], usually loaded from TOML:
//!
//! ```no_run
//! use rust_data_ingest::config::IngestConfig;
//! use rust_data_ingest::pipeline::Ingestor;
//!
//! # fn main() -> Result<(), rust_data_ingest::IngestionError> {
//! let config = IngestConfig::from_path("ingest.toml")?;
//! let ingestor = Ingestor::open(&config)?;
//! let bytes = std::fs::read("report.xlsx")?;
//! let result = ingestor.ingest(&bytes, "report.xlsx")?;
//! println!("{} -> {:?}", result.file_id, result.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: the orchestrator and its read side
//! - [`ingestion`]: format dispatch, encoding recovery, per-format parsers, observers
//! - [`execution`]: batched transactional persistence and its metrics
//! - [`storage`]: `FileStore` / `RecordSink` / `RecordStore` and bundled backends
//! - [`config`]: TOML configuration
//! - [`types`]: records, rows and values
//! - [`error`]: error types used across the crate

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use error::{IngestionError, IngestionResult};
pub use pipeline::{IngestionOptions, Ingestor};
