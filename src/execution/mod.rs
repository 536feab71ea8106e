//! Batched, transactional persistence of parsed rows.
//!
//! [`BatchPersister`] sits between the parsers and a [`RecordSink`]:
//!
//! - rows are written in order with 1-based indices
//! - the sink is flushed after every full batch
//! - one commit at the end makes the whole file visible at once
//! - any failure rolls the transaction back before the error is returned

mod observer;

use std::sync::Arc;
use std::time::Instant;

use crate::error::SinkResult;
use crate::storage::RecordSink;
use crate::types::{FileId, Fields};

pub use observer::{PersistEvent, PersistMetrics, PersistMetricsSnapshot, PersistObserver, TracingPersistObserver};

/// Rows per flush when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for the [`BatchPersister`].
#[derive(Debug, Clone)]
pub struct PersistOptions {
    /// Number of rows written between flushes.
    pub batch_size: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Writes one file's rows to a sink under a single transaction.
pub struct BatchPersister {
    opts: PersistOptions,
    observer: Option<Arc<dyn PersistObserver>>,
    metrics: Arc<PersistMetrics>,
}

impl BatchPersister {
    /// # Panics
    ///
    /// Panics if `batch_size == 0`.
    pub fn new(opts: PersistOptions) -> Self {
        assert!(opts.batch_size > 0, "batch_size must be > 0");
        Self {
            opts,
            observer: None,
            metrics: Arc::new(PersistMetrics::new()),
        }
    }

    /// Attach an observer for persistence events.
    pub fn with_observer(mut self, observer: Arc<dyn PersistObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handle to the running counters.
    pub fn metrics(&self) -> Arc<PersistMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Persist `rows` for `file_id` and return the number committed.
    pub fn persist(&self, sink: &mut dyn RecordSink, file_id: &FileId, rows: &[Fields]) -> SinkResult<u64> {
        self.persist_with(sink, file_id, rows, |_, _| Ok(()))
    }

    /// Like [`persist`](Self::persist), but runs `before_commit` inside the open transaction
    /// once every row has been written. Its writes commit or roll back together with the rows.
    pub fn persist_with<F>(
        &self,
        sink: &mut dyn RecordSink,
        file_id: &FileId,
        rows: &[Fields],
        before_commit: F,
    ) -> SinkResult<u64>
    where
        F: FnOnce(&mut dyn RecordSink, u64) -> SinkResult<()>,
    {
        let start = Instant::now();
        sink.begin_file_transaction(file_id)?;
        self.emit(PersistEvent::TransactionStarted { file_id: *file_id });
        tracing::debug!(%file_id, rows = rows.len(), batch_size = self.opts.batch_size, "persist started");

        let mut written = 0u64;
        let outcome = self
            .write_all(sink, file_id, rows, &mut written)
            .and_then(|()| before_commit(&mut *sink, written))
            .and_then(|()| sink.commit());

        match outcome {
            Ok(()) => {
                let elapsed = start.elapsed();
                self.metrics.on_commit(elapsed);
                self.emit(PersistEvent::Committed {
                    file_id: *file_id,
                    rows: written,
                    elapsed,
                });
                tracing::debug!(%file_id, rows = written, ?elapsed, "persist committed");
                Ok(written)
            }
            Err(err) => {
                if let Err(rollback_err) = sink.rollback() {
                    tracing::error!(%file_id, error = %rollback_err, "rollback failed");
                }
                self.metrics.on_rollback();
                self.emit(PersistEvent::RolledBack {
                    file_id: *file_id,
                    written,
                    reason: err.to_string(),
                });
                tracing::warn!(%file_id, written, error = %err, "persist rolled back");
                Err(err)
            }
        }
    }

    fn write_all(
        &self,
        sink: &mut dyn RecordSink,
        file_id: &FileId,
        rows: &[Fields],
        written: &mut u64,
    ) -> SinkResult<()> {
        for batch in rows.chunks(self.opts.batch_size) {
            for fields in batch {
                sink.write_row(file_id, *written + 1, fields)?;
                *written += 1;
                self.metrics.on_row_written();
            }
            // A trailing partial batch is left to the commit.
            if batch.len() < self.opts.batch_size {
                break;
            }
            sink.flush()?;
            self.metrics.on_batch_flushed();
            self.emit(PersistEvent::BatchFlushed {
                file_id: *file_id,
                rows: batch.len(),
            });
        }
        Ok(())
    }

    fn emit(&self, event: PersistEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl Default for BatchPersister {
    fn default() -> Self {
        Self::new(PersistOptions::default())
    }
}
