use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::types::FileId;

/// Events emitted while a file's rows are persisted.
#[derive(Debug, Clone)]
pub enum PersistEvent {
    TransactionStarted { file_id: FileId },
    BatchFlushed { file_id: FileId, rows: usize },
    Committed { file_id: FileId, rows: u64, elapsed: Duration },
    RolledBack { file_id: FileId, written: u64, reason: String },
}

/// Observer hook for persistence events.
pub trait PersistObserver: Send + Sync {
    fn on_event(&self, event: &PersistEvent);
}

/// Logs persistence events through `tracing` at debug level.
#[derive(Default)]
pub struct TracingPersistObserver;

impl PersistObserver for TracingPersistObserver {
    fn on_event(&self, event: &PersistEvent) {
        tracing::debug!(?event, "persist event");
    }
}

/// Running totals across every persist call made by one persister.
///
/// Counters are updated as batches land; callers can snapshot them at any time.
pub struct PersistMetrics {
    rows_written: AtomicU64,
    batches_flushed: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    last_elapsed: Mutex<Option<Duration>>,
}

impl PersistMetrics {
    pub fn new() -> Self {
        Self {
            rows_written: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            last_elapsed: Mutex::new(None),
        }
    }

    pub(crate) fn on_row_written(&self) {
        let _ = self.rows_written.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_batch_flushed(&self) {
        let _ = self.batches_flushed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_commit(&self, elapsed: Duration) {
        let _ = self.commits.fetch_add(1, Ordering::SeqCst);
        *self.last_elapsed.lock() = Some(elapsed);
    }

    pub(crate) fn on_rollback(&self) {
        let _ = self.rollbacks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PersistMetricsSnapshot {
        PersistMetricsSnapshot {
            rows_written: self.rows_written.load(Ordering::SeqCst),
            batches_flushed: self.batches_flushed.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
            last_commit_elapsed: *self.last_elapsed.lock(),
        }
    }
}

impl Default for PersistMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`PersistMetrics`].
///
/// `rows_written` counts every row handed to a sink, including rows later rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistMetricsSnapshot {
    pub rows_written: u64,
    pub batches_flushed: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub last_commit_elapsed: Option<Duration>,
}

impl fmt::Display for PersistMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows_written={}, batches_flushed={}, commits={}, rollbacks={}, last_commit_elapsed={:?}",
            self.rows_written, self.batches_flushed, self.commits, self.rollbacks, self.last_commit_elapsed
        )
    }
}
