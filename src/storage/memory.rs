use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{SinkError, SinkResult};
use crate::types::{
    FileId, FilePage, FileQuery, FileRecord, FileStatus, FileTypeCount, Fields, IngestStats, NormalizedRow,
    RECENT_UPLOADS,
};

use super::{RecordSink, RecordStore};

#[derive(Debug, Default)]
struct State {
    files: HashMap<FileId, FileRecord>,
    rows: HashMap<FileId, Vec<NormalizedRow>>,
}

/// In-process record store.
///
/// Each sink session buffers its writes privately and publishes them under one write lock at
/// commit, so readers never observe a partially written file. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemorySink<'a> {
    store: &'a MemoryStore,
    open: Option<FileId>,
    pending: Vec<NormalizedRow>,
    staged: Vec<NormalizedRow>,
    staged_records: Vec<FileRecord>,
}

impl MemorySink<'_> {
    fn require_open(&self, file_id: Option<&FileId>) -> SinkResult<()> {
        match (&self.open, file_id) {
            (None, _) => Err(SinkError::transaction("no open file transaction")),
            (Some(open), Some(id)) if open != id => Err(SinkError::transaction(format!(
                "row for file {id} written inside transaction for file {open}"
            ))),
            _ => Ok(()),
        }
    }

    fn discard(&mut self) {
        self.open = None;
        self.pending.clear();
        self.staged.clear();
        self.staged_records.clear();
    }
}

impl RecordSink for MemorySink<'_> {
    fn begin_file_transaction(&mut self, file_id: &FileId) -> SinkResult<()> {
        if let Some(open) = &self.open {
            return Err(SinkError::transaction(format!(
                "transaction for file {open} is still open"
            )));
        }
        self.discard();
        self.open = Some(*file_id);
        Ok(())
    }

    fn write_row(&mut self, file_id: &FileId, index: u64, fields: &Fields) -> SinkResult<()> {
        self.require_open(Some(file_id))?;
        self.pending.push(NormalizedRow {
            file_id: *file_id,
            row_index: index,
            fields: fields.clone(),
        });
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.require_open(None)?;
        self.staged.append(&mut self.pending);
        Ok(())
    }

    fn commit(&mut self) -> SinkResult<()> {
        self.flush()?;
        let Some(file_id) = self.open else {
            return Err(SinkError::transaction("no open file transaction"));
        };

        {
            let mut state = self.store.state.write();
            for record in self.staged_records.drain(..) {
                state.files.insert(record.id, record);
            }
            if !self.staged.is_empty() {
                state
                    .rows
                    .entry(file_id)
                    .or_default()
                    .append(&mut self.staged);
            }
        }

        self.discard();
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        self.discard();
        Ok(())
    }

    fn put_file_record(&mut self, record: &FileRecord) -> SinkResult<()> {
        if self.open.is_some() {
            self.staged_records.push(record.clone());
        } else {
            self.store.state.write().files.insert(record.id, record.clone());
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn sink(&self) -> SinkResult<Box<dyn RecordSink + '_>> {
        Ok(Box::new(MemorySink {
            store: self,
            open: None,
            pending: Vec::new(),
            staged: Vec::new(),
            staged_records: Vec::new(),
        }))
    }

    fn file_record(&self, id: &FileId) -> SinkResult<Option<FileRecord>> {
        Ok(self.state.read().files.get(id).cloned())
    }

    fn list_file_records(&self, query: &FileQuery) -> SinkResult<FilePage> {
        let state = self.state.read();
        let mut matching: Vec<&FileRecord> = state
            .files
            .values()
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(FilePage {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(query.skip)
                .take(query.limit)
                .cloned()
                .collect(),
        })
    }

    fn rows(&self, id: &FileId, skip: usize, limit: usize) -> SinkResult<Vec<NormalizedRow>> {
        let state = self.state.read();
        Ok(state
            .rows
            .get(id)
            .map(|rows| rows.iter().skip(skip).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn row_count(&self, id: &FileId) -> SinkResult<u64> {
        Ok(self.state.read().rows.get(id).map_or(0, |rows| rows.len() as u64))
    }

    fn remove_file(&self, id: &FileId) -> SinkResult<Option<FileRecord>> {
        let mut state = self.state.write();
        state.rows.remove(id);
        Ok(state.files.remove(id))
    }

    fn stats(&self) -> SinkResult<IngestStats> {
        let mut stats = IngestStats::default();
        {
            let state = self.state.read();
            let mut types: BTreeMap<String, u64> = BTreeMap::new();
            for record in state.files.values() {
                stats.total_files += 1;
                match record.status {
                    FileStatus::Completed => stats.completed += 1,
                    FileStatus::Failed => stats.failed += 1,
                    FileStatus::Processing => stats.processing += 1,
                    FileStatus::Pending => stats.pending += 1,
                }
                *types.entry(record.extension.clone()).or_default() += 1;
            }
            stats.total_rows = state.rows.values().map(|rows| rows.len() as u64).sum();
            stats.file_types = types
                .into_iter()
                .map(|(file_type, count)| FileTypeCount { file_type, count })
                .collect();
        }

        stats.recent = self
            .list_file_records(&FileQuery {
                skip: 0,
                limit: RECENT_UPLOADS,
                status: None,
            })?
            .items;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn record(id: FileId) -> FileRecord {
        FileRecord::processing(id, "a.csv", "csv", 3, Location::new("memory://a.csv"))
    }

    fn fields(n: i64) -> Fields {
        [("n", n)].into_iter().collect()
    }

    #[test]
    fn rows_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let id = FileId::new();
        let mut sink = store.sink().unwrap();

        sink.begin_file_transaction(&id).unwrap();
        sink.write_row(&id, 1, &fields(1)).unwrap();
        sink.flush().unwrap();
        sink.write_row(&id, 2, &fields(2)).unwrap();
        assert_eq!(store.row_count(&id).unwrap(), 0);

        sink.commit().unwrap();
        assert_eq!(store.row_count(&id).unwrap(), 2);
        let rows = store.rows(&id, 1, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_index, 2);
    }

    #[test]
    fn rollback_discards_rows_and_staged_records() {
        let store = MemoryStore::new();
        let id = FileId::new();
        let mut sink = store.sink().unwrap();

        sink.begin_file_transaction(&id).unwrap();
        sink.write_row(&id, 1, &fields(1)).unwrap();
        sink.put_file_record(&record(id)).unwrap();
        sink.rollback().unwrap();

        assert_eq!(store.row_count(&id).unwrap(), 0);
        assert!(store.file_record(&id).unwrap().is_none());
    }

    #[test]
    fn write_without_transaction_is_rejected() {
        let store = MemoryStore::new();
        let id = FileId::new();
        let mut sink = store.sink().unwrap();
        let err = sink.write_row(&id, 1, &fields(1)).unwrap_err();
        assert!(err.to_string().contains("no open file transaction"));
    }

    #[test]
    fn put_file_record_without_transaction_is_immediate() {
        let store = MemoryStore::new();
        let id = FileId::new();
        store.sink().unwrap().put_file_record(&record(id)).unwrap();
        assert_eq!(store.file_record(&id).unwrap().unwrap().status, FileStatus::Processing);
    }
}
