//! Format detection, encoding recovery and parsing.
//!
//! Most callers go through [`crate::pipeline::Ingestor`], which picks a parser with
//! [`IngestionFormat::from_extension`] and reports outcomes to an [`IngestionObserver`].
//!
//! Format-specific parsers are also available under:
//! - [`csv`]
//! - [`excel`] (feature `excel`)
//! - [`json`]
//! - [`text`]

mod cells;
pub mod csv;
pub mod encoding;
#[cfg(feature = "excel")]
pub mod excel;
pub mod json;
pub mod observability;
pub mod text;
pub mod unified;

pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver,
};
pub use unified::{IngestionFormat, ParsedFile, SUPPORTED_EXTENSIONS, extension_of, select_format};
