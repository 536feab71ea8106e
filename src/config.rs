//! File-based configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::execution::DEFAULT_BATCH_SIZE;
use crate::pipeline::IngestionOptions;

/// Largest accepted upload when nothing else is configured (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Settings for a disk + SQLite pipeline, usually loaded from TOML.
///
/// ```toml
/// upload_dir = "uploads"
/// database_path = "ingest.db"
/// max_file_size = 104857600
/// batch_size = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory receiving raw uploads as `<id>.<extension>`
    pub upload_dir: PathBuf,
    /// SQLite database holding file records and rows
    pub database_path: PathBuf,
    /// Uploads larger than this are rejected (bytes)
    pub max_file_size: u64,
    /// Rows written between flushes
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            database_path: PathBuf::from("ingest.db"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl IngestConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> IngestionResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| IngestionError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| IngestionError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> IngestionResult<()> {
        if self.batch_size == 0 {
            return Err(IngestionError::Config {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        if self.max_file_size == 0 {
            return Err(IngestionError::Config {
                message: "max_file_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Runtime options carrying this config's limits and no observer.
    pub fn options(&self) -> IngestionOptions {
        IngestionOptions {
            max_file_size: self.max_file_size,
            batch_size: self.batch_size,
            ..IngestionOptions::default()
        }
    }
}
