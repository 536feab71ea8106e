use std::sync::{Arc, Mutex};

use rust_data_ingest::error::{SinkError, SinkResult};
use rust_data_ingest::execution::{PersistEvent, PersistObserver};
use rust_data_ingest::ingestion::{
    CompositeObserver, FileObserver, IngestionContext, IngestionFormat, IngestionObserver, IngestionSeverity,
    IngestionStats,
};
use rust_data_ingest::pipeline::{IngestionOptions, Ingestor};
use rust_data_ingest::storage::{MemoryFileStore, MemoryStore, RecordSink, RecordStore};
use rust_data_ingest::types::{FileId, FilePage, FileQuery, FileRecord, IngestStats, NormalizedRow};
use rust_data_ingest::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<(Option<IngestionFormat>, IngestionStats)>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push((ctx.format, stats));
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn observed(obs: Arc<RecordingObserver>, alert_at_or_above: IngestionSeverity) -> Ingestor<MemoryStore, MemoryFileStore> {
    let opts = IngestionOptions {
        observer: Some(obs),
        alert_at_or_above,
        ..Default::default()
    };
    Ingestor::new(MemoryStore::new(), MemoryFileStore::new(), opts)
}

/// A record store whose backend is down.
struct UnavailableStore;

fn down<T>() -> SinkResult<T> {
    Err(SinkError::Backend {
        message: "database unavailable".to_string(),
    })
}

impl RecordStore for UnavailableStore {
    fn sink(&self) -> SinkResult<Box<dyn RecordSink + '_>> {
        down()
    }

    fn file_record(&self, _id: &FileId) -> SinkResult<Option<FileRecord>> {
        down()
    }

    fn list_file_records(&self, _query: &FileQuery) -> SinkResult<FilePage> {
        down()
    }

    fn rows(&self, _id: &FileId, _skip: usize, _limit: usize) -> SinkResult<Vec<NormalizedRow>> {
        down()
    }

    fn row_count(&self, _id: &FileId) -> SinkResult<u64> {
        down()
    }

    fn remove_file(&self, _id: &FileId) -> SinkResult<Option<FileRecord>> {
        down()
    }

    fn stats(&self) -> SinkResult<IngestStats> {
        down()
    }
}

#[test]
fn observer_receives_success_with_counts() {
    let obs = Arc::new(RecordingObserver::default());
    let ingestor = observed(obs.clone(), IngestionSeverity::Critical);

    ingestor.ingest(b"a\n\nb\n", "notes.txt").unwrap();

    let successes = obs.successes.lock().unwrap().clone();
    assert_eq!(
        successes,
        vec![(
            Some(IngestionFormat::Text),
            IngestionStats {
                total_rows: 3,
                imported_rows: 2
            }
        )]
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn validation_failure_is_a_warning_without_alert() {
    let obs = Arc::new(RecordingObserver::default());
    let ingestor = observed(obs.clone(), IngestionSeverity::Critical);

    let _ = ingestor.ingest(b"MZ", "setup.exe").unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Warning]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn parse_failure_is_an_error_and_alerts_at_error_threshold() {
    let obs = Arc::new(RecordingObserver::default());
    let ingestor = observed(obs.clone(), IngestionSeverity::Error);

    // The call succeeds; the upload is recorded as failed.
    ingestor.ingest(b"[1, 2", "broken.json").unwrap();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Error]);
}

#[test]
fn unavailable_record_store_is_critical() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        ..Default::default()
    };
    let ingestor = Ingestor::new(UnavailableStore, MemoryFileStore::new(), opts);

    let err = ingestor.ingest(b"a,b\n1,2\n", "data.csv").unwrap_err();
    assert!(matches!(err, IngestionError::Persistence(_)));
    // Stored bytes are cleaned up when no record could be written.
    assert!(ingestor.files().is_empty());

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Critical]);
}

#[test]
fn composite_observer_fans_out() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn IngestionObserver>> = vec![a.clone(), b.clone()];
    let composite = CompositeObserver::new(observers);
    let ingestor = Ingestor::new(
        MemoryStore::new(),
        MemoryFileStore::new(),
        IngestionOptions {
            observer: Some(Arc::new(composite)),
            alert_at_or_above: IngestionSeverity::Warning,
            ..Default::default()
        },
    );

    let _ = ingestor.ingest(b"", "").unwrap_err();

    for obs in [&a, &b] {
        assert_eq!(obs.failures.lock().unwrap().clone(), vec![IngestionSeverity::Warning]);
        assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestionSeverity::Warning]);
    }
}

#[test]
fn file_observer_appends_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ingest.log");
    let ingestor = Ingestor::new(
        MemoryStore::new(),
        MemoryFileStore::new(),
        IngestionOptions {
            observer: Some(Arc::new(FileObserver::new(&log))),
            ..Default::default()
        },
    );

    ingestor.ingest(b"x\n", "ok.txt").unwrap();
    ingestor.ingest(b"{", "bad.json").unwrap();

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("ok file=ok.txt"));
    assert!(lines[0].contains("format=text"));
    assert!(lines[1].contains("fail severity=Error file=bad.json"));
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl PersistObserver for EventLog {
    fn on_event(&self, event: &PersistEvent) {
        let name = match event {
            PersistEvent::TransactionStarted { .. } => "started".to_string(),
            PersistEvent::BatchFlushed { rows, .. } => format!("flushed {rows}"),
            PersistEvent::Committed { rows, .. } => format!("committed {rows}"),
            PersistEvent::RolledBack { .. } => "rolled back".to_string(),
        };
        self.0.lock().unwrap().push(name);
    }
}

#[test]
fn persist_observer_sees_batches() {
    let events = Arc::new(EventLog::default());
    let ingestor = Ingestor::new(
        MemoryStore::new(),
        MemoryFileStore::new(),
        IngestionOptions {
            batch_size: 2,
            persist_observer: Some(events.clone()),
            ..Default::default()
        },
    );

    ingestor.ingest(b"a\nb\nc\n", "three.txt").unwrap();

    assert_eq!(
        events.0.lock().unwrap().clone(),
        vec!["started", "flushed 2", "committed 3"]
    );
}
