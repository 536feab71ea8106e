use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::IngestionError;
use crate::types::FileId;

use super::unified::IngestionFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Request rejected before processing (bad name/extension/size).
    Warning,
    /// The file itself could not be ingested (parse failure).
    Error,
    /// Storage or persistence infrastructure failed.
    Critical,
}

impl IngestionSeverity {
    /// Severity assigned to an error returned or recorded by the pipeline.
    pub fn for_error(e: &IngestionError) -> Self {
        match e {
            IngestionError::Validation { .. } | IngestionError::NotFound { .. } => Self::Warning,
            IngestionError::Parse(_) | IngestionError::Config { .. } => Self::Error,
            IngestionError::Persistence(_) | IngestionError::Storage(_) => Self::Critical,
        }
    }
}

/// Context about an ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Filename as declared by the caller.
    pub file_name: String,
    /// Format chosen by the dispatcher (unset when validation failed first).
    pub format: Option<IngestionFormat>,
    /// Allocated file id (unset when rejected before storage).
    pub file_id: Option<FileId>,
}

/// Row counts reported on successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Rows discovered in the input.
    pub total_rows: u64,
    /// Rows durably committed.
    pub imported_rows: u64,
}

/// Observer interface for ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a file reaches `completed`.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a file is rejected or reaches `failed`.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a failure meets the configured alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards ingestion events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            file = %ctx.file_name,
            file_id = ?ctx.file_id,
            format = ?ctx.format,
            total_rows = stats.total_rows,
            imported_rows = stats.imported_rows,
            "ingestion completed"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            file = %ctx.file_name,
            file_id = ?ctx.file_id,
            format = ?ctx.format,
            ?severity,
            %error,
            "ingestion failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            file = %ctx.file_name,
            file_id = ?ctx.file_id,
            format = ?ctx.format,
            ?severity,
            %error,
            "ingestion alert"
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "ok file={} id={} format={} total_rows={} imported_rows={}",
            ctx.file_name,
            display_id(ctx),
            display_format(ctx),
            stats.total_rows,
            stats.imported_rows
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "fail severity={:?} file={} id={} format={} err={}",
            severity,
            ctx.file_name,
            display_id(ctx),
            display_format(ctx),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "ALERT severity={:?} file={} id={} format={} err={}",
            severity,
            ctx.file_name,
            display_id(ctx),
            display_format(ctx),
            error
        ));
    }
}

fn display_id(ctx: &IngestionContext) -> String {
    ctx.file_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

fn display_format(ctx: &IngestionContext) -> String {
    ctx.format.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string())
}
