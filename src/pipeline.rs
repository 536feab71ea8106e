//! The ingestion orchestrator.
//!
//! [`Ingestor`] drives one upload from raw bytes to a terminal [`FileRecord`]:
//! validate, store bytes, record `processing`, parse, persist, record the outcome.
//! It also serves the read side (progress, listings, rows, stats) and cascading deletes.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::error::{IngestionError, IngestionResult, SinkResult};
use crate::execution::{BatchPersister, DEFAULT_BATCH_SIZE, PersistMetrics, PersistObserver, PersistOptions};
use crate::ingestion::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, select_format};
use crate::storage::{FileStore, RecordStore};
use crate::types::{
    FileId, FilePage, FileQuery, FileRecord, IngestResult, IngestStats, MAX_PAGE_LIMIT, ProgressInfo, RowPage,
    format_size,
};

/// Runtime options for an [`Ingestor`].
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Uploads larger than this many bytes are rejected before anything is stored.
    pub max_file_size: u64,
    /// Rows written between sink flushes.
    pub batch_size: usize,
    /// Optional observer for ingestion outcomes and alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Optional observer for batch/commit/rollback events.
    pub persist_observer: Option<Arc<dyn PersistObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("max_file_size", &self.max_file_size)
            .field("batch_size", &self.batch_size)
            .field("observer_set", &self.observer.is_some())
            .field("persist_observer_set", &self.persist_observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            observer: None,
            persist_observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Ingestion pipeline over a record store `S` and a byte store `F`.
///
/// Each [`ingest`](Self::ingest) call runs start to finish on the calling thread. Concurrent
/// calls for different uploads only share the record store.
pub struct Ingestor<S, F> {
    records: S,
    files: F,
    options: IngestionOptions,
    persister: BatchPersister,
}

// A failed upload is still a successful call; the error rides along for the observers.
type Outcome = (IngestResult, Option<IngestionError>);

impl<S: RecordStore, F: FileStore> Ingestor<S, F> {
    /// # Panics
    ///
    /// Panics if `options.batch_size == 0`.
    pub fn new(records: S, files: F, options: IngestionOptions) -> Self {
        let mut persister = BatchPersister::new(PersistOptions {
            batch_size: options.batch_size,
        });
        if let Some(observer) = &options.persist_observer {
            persister = persister.with_observer(Arc::clone(observer));
        }
        Self {
            records,
            files,
            options,
            persister,
        }
    }

    pub fn records(&self) -> &S {
        &self.records
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    /// Counters of the batch persister shared by every ingestion.
    pub fn persist_metrics(&self) -> Arc<PersistMetrics> {
        self.persister.metrics()
    }

    /// Ingest one upload.
    ///
    /// Returns `Err` only when nothing durable describes the attempt: validation failures
    /// (nothing is stored), byte store failures, and record store failures while writing the
    /// file record itself. Parse and row persistence failures return `Ok` with status `failed`.
    pub fn ingest(&self, bytes: &[u8], filename: &str) -> IngestionResult<IngestResult> {
        let mut ctx = IngestionContext {
            file_name: filename.to_string(),
            format: None,
            file_id: None,
        };
        let outcome = self.run(bytes, filename, &mut ctx);
        self.report(&ctx, &outcome);
        outcome.map(|(result, _)| result)
    }

    fn run(&self, bytes: &[u8], filename: &str, ctx: &mut IngestionContext) -> IngestionResult<Outcome> {
        if filename.trim().is_empty() {
            return Err(IngestionError::validation("filename must not be empty"));
        }
        let (format, extension) = select_format(filename)?;
        ctx.format = Some(format);

        let size = bytes.len() as u64;
        if size > self.options.max_file_size {
            return Err(IngestionError::validation(format!(
                "file too large: {} exceeds the {} limit",
                format_size(size),
                format_size(self.options.max_file_size)
            )));
        }

        let file_id = FileId::new();
        ctx.file_id = Some(file_id);
        let location = self.files.save(&file_id, &extension, bytes)?;
        tracing::info!(%file_id, file = filename, %format, size, "upload accepted");

        let mut record = FileRecord::processing(file_id, filename, extension, size, location);
        if let Err(e) = self.put_record(&record) {
            if let Err(cleanup) = self.files.delete(&record.location) {
                tracing::warn!(%file_id, error = %cleanup, "could not remove stored bytes");
            }
            return Err(e.into());
        }

        let parsed = match format.parse(bytes, None) {
            Ok(parsed) => parsed,
            Err(e) => {
                let err = IngestionError::Parse(e);
                record.fail(0, err.to_string());
                self.put_record(&record)?;
                tracing::warn!(%file_id, %format, error = %err, "parse failed");
                return Ok((IngestResult::from_record(&record), Some(err)));
            }
        };

        let total_rows = parsed.total_rows as u64;
        let mut completed = record.clone();
        let persisted = self.records.sink().and_then(|mut sink| {
            self.persister
                .persist_with(sink.as_mut(), &file_id, &parsed.rows, |sink, imported| {
                    completed.complete(total_rows, imported);
                    sink.put_file_record(&completed)
                })
        });

        match persisted {
            Ok(imported) => {
                tracing::info!(%file_id, %format, total_rows, imported_rows = imported, "ingestion completed");
                Ok((IngestResult::from_record(&completed), None))
            }
            Err(e) => {
                let err = IngestionError::Persistence(e);
                record.fail(total_rows, err.to_string());
                self.put_record(&record)?;
                tracing::error!(%file_id, %format, error = %err, "ingestion failed during persistence");
                Ok((IngestResult::from_record(&record), Some(err)))
            }
        }
    }

    fn put_record(&self, record: &FileRecord) -> SinkResult<()> {
        self.records.sink()?.put_file_record(record)
    }

    fn report(&self, ctx: &IngestionContext, outcome: &IngestionResult<Outcome>) {
        let Some(obs) = self.options.observer.as_ref() else {
            return;
        };
        let error = match outcome {
            Ok((result, None)) => {
                obs.on_success(
                    ctx,
                    IngestionStats {
                        total_rows: result.total_rows,
                        imported_rows: result.imported_rows,
                    },
                );
                return;
            }
            Ok((_, Some(e))) | Err(e) => e,
        };

        let sev = IngestionSeverity::for_error(error);
        obs.on_failure(ctx, sev, error);
        if sev >= self.options.alert_at_or_above {
            obs.on_alert(ctx, sev, error);
        }
    }

    /// Progress of an upload. Reading it never changes it.
    pub fn progress(&self, id: &FileId) -> IngestionResult<ProgressInfo> {
        Ok(self.file(id)?.progress())
    }

    pub fn file(&self, id: &FileId) -> IngestionResult<FileRecord> {
        self.records
            .file_record(id)?
            .ok_or(IngestionError::NotFound { file_id: *id })
    }

    /// File records newest first, optionally filtered by status.
    pub fn list_files(&self, query: &FileQuery) -> IngestionResult<FilePage> {
        check_limit(query.limit)?;
        Ok(self.records.list_file_records(query)?)
    }

    /// Committed rows of one file ordered by row index.
    pub fn rows(&self, id: &FileId, skip: usize, limit: usize) -> IngestionResult<RowPage> {
        check_limit(limit)?;
        let record = self.file(id)?;
        let total = self.records.row_count(id)?;
        let items = self.records.rows(id, skip, limit)?;
        Ok(RowPage {
            file_id: *id,
            file_name: record.original_name,
            total,
            skip,
            limit,
            items,
        })
    }

    /// Delete an upload: stored bytes, rows, then the record. Returns the removed record.
    ///
    /// Bytes that are already gone from the byte store are not an error.
    pub fn delete_file(&self, id: &FileId) -> IngestionResult<FileRecord> {
        let record = self.file(id)?;
        match self.files.delete(&record.location) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(file_id = %id, location = %record.location, "stored bytes already gone");
            }
            Err(e) => return Err(e.into()),
        }

        let removed = self
            .records
            .remove_file(id)?
            .ok_or(IngestionError::NotFound { file_id: *id })?;
        tracing::info!(file_id = %id, file = %removed.original_name, "file deleted");
        Ok(removed)
    }

    pub fn stats(&self) -> IngestionResult<IngestStats> {
        Ok(self.records.stats()?)
    }
}

#[cfg(feature = "sqlite")]
impl Ingestor<crate::storage::SqliteStore, crate::storage::DiskFileStore> {
    /// Build a disk + SQLite pipeline from a validated config.
    pub fn open(config: &crate::config::IngestConfig) -> IngestionResult<Self> {
        config.validate()?;
        let files = crate::storage::DiskFileStore::new(&config.upload_dir)?;
        let records = crate::storage::SqliteStore::open(&config.database_path)?;
        Ok(Self::new(records, files, config.options()))
    }
}

fn check_limit(limit: usize) -> IngestionResult<()> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(IngestionError::validation(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryFileStore, MemoryStore};
    use crate::types::FileStatus;

    fn ingestor() -> Ingestor<MemoryStore, MemoryFileStore> {
        Ingestor::new(MemoryStore::new(), MemoryFileStore::new(), IngestionOptions::default())
    }

    #[test]
    fn empty_filename_is_rejected_before_storage() {
        let ing = ingestor();
        let err = ing.ingest(b"a\n", "  ").unwrap_err();
        assert!(matches!(err, IngestionError::Validation { .. }));
        assert!(ing.files().is_empty());
    }

    #[test]
    fn oversized_upload_is_rejected_before_storage() {
        let ing = Ingestor::new(
            MemoryStore::new(),
            MemoryFileStore::new(),
            IngestionOptions {
                max_file_size: 4,
                ..IngestionOptions::default()
            },
        );
        let err = ing.ingest(b"hello\n", "big.txt").unwrap_err();
        assert!(err.to_string().contains("file too large: 6.0B exceeds the 4.0B limit"));
        assert!(ing.files().is_empty());
        assert_eq!(ing.stats().unwrap().total_files, 0);
    }

    #[test]
    fn upload_at_exactly_the_limit_is_accepted() {
        let ing = Ingestor::new(
            MemoryStore::new(),
            MemoryFileStore::new(),
            IngestionOptions {
                max_file_size: 4,
                ..IngestionOptions::default()
            },
        );
        let result = ing.ingest(b"abc\n", "edge.txt").unwrap();
        assert_eq!(result.status, FileStatus::Completed);
        assert_eq!(result.imported_rows, 1);
        assert_eq!(ing.files().len(), 1);

        let err = ing.ingest(b"abcd\n", "over.txt").unwrap_err();
        assert!(matches!(err, IngestionError::Validation { .. }));
    }

    #[test]
    fn listing_limits_are_checked() {
        let ing = ingestor();
        for limit in [0, MAX_PAGE_LIMIT + 1] {
            let query = FileQuery {
                limit,
                ..FileQuery::default()
            };
            assert!(matches!(
                ing.list_files(&query).unwrap_err(),
                IngestionError::Validation { .. }
            ));
        }
        assert_eq!(ing.list_files(&FileQuery::default()).unwrap().total, 0);
    }

    #[test]
    fn completed_record_carries_message() {
        let ing = ingestor();
        let result = ing.ingest(b"one\ntwo\n", "notes.txt").unwrap();
        let record = ing.file(&result.file_id).unwrap();
        assert_eq!(record.status, FileStatus::Completed);
        assert_eq!(record.message.as_deref(), Some("imported 2 rows"));
        assert_eq!(record.extension, "txt");
        assert_eq!(ing.persist_metrics().snapshot().commits, 1);
    }
}
