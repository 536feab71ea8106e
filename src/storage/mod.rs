//! Collaborator interfaces consumed by the pipeline, plus the bundled backends.
//!
//! - [`FileStore`]: raw upload bytes ([`DiskFileStore`], [`MemoryFileStore`])
//! - [`RecordSink`]: transactional row writes for one file
//! - [`RecordStore`]: hands out sinks and serves reads ([`MemoryStore`], `SqliteStore`)

mod files;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::io;

pub use files::{DiskFileStore, MemoryFileStore};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::error::SinkResult;
use crate::types::{FileId, FileQuery, FilePage, FileRecord, Fields, IngestStats, Location, NormalizedRow};

/// Byte storage for raw uploads.
pub trait FileStore: Send + Sync {
    /// Store `bytes` for `id` and return where they went. Locations are write-once.
    fn save(&self, id: &FileId, extension: &str, bytes: &[u8]) -> io::Result<Location>;

    /// Remove stored bytes. Absent locations fail with [`io::ErrorKind::NotFound`].
    fn delete(&self, location: &Location) -> io::Result<()>;
}

/// Write side of the record store, scoped to one session.
///
/// Rows written between [`begin_file_transaction`](Self::begin_file_transaction) and
/// [`commit`](Self::commit) become visible to readers all at once, or not at all after
/// [`rollback`](Self::rollback). Implementations must accept at least 100 pending writes
/// before a [`flush`](Self::flush) is required.
pub trait RecordSink {
    fn begin_file_transaction(&mut self, file_id: &FileId) -> SinkResult<()>;

    fn write_row(&mut self, file_id: &FileId, index: u64, fields: &Fields) -> SinkResult<()>;

    /// Push pending writes to the backend without making them visible.
    fn flush(&mut self) -> SinkResult<()>;

    fn commit(&mut self) -> SinkResult<()>;

    fn rollback(&mut self) -> SinkResult<()>;

    /// Insert or replace a file record. Joins the open transaction if there is one,
    /// otherwise it is written immediately.
    fn put_file_record(&mut self, record: &FileRecord) -> SinkResult<()>;
}

/// Durable home of file records and their rows.
pub trait RecordStore: Send + Sync {
    /// Open a write session.
    fn sink(&self) -> SinkResult<Box<dyn RecordSink + '_>>;

    fn file_record(&self, id: &FileId) -> SinkResult<Option<FileRecord>>;

    /// Records newest first, filtered and paged by `query`.
    fn list_file_records(&self, query: &FileQuery) -> SinkResult<FilePage>;

    /// Committed rows of a file ordered by row index.
    fn rows(&self, id: &FileId, skip: usize, limit: usize) -> SinkResult<Vec<NormalizedRow>>;

    /// Number of committed rows of a file.
    fn row_count(&self, id: &FileId) -> SinkResult<u64>;

    /// Delete a record and all of its rows. Returns the removed record, if any.
    fn remove_file(&self, id: &FileId) -> SinkResult<Option<FileRecord>>;

    fn stats(&self) -> SinkResult<IngestStats>;
}
