//! SQLite record store.
//!
//! File records live in `upload_file_records`; rows live in `imported_data` with the field map
//! stored as JSON text.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{SinkError, SinkResult};
use crate::types::{
    FileId, FilePage, FileQuery, FileRecord, FileStatus, FileTypeCount, Fields, IngestStats, Location,
    NormalizedRow, RECENT_UPLOADS,
};

use super::{RecordSink, RecordStore};

const FILE_COLUMNS: &str = "id, original_filename, file_type, file_size, file_path, status, message, \
                            total_rows, imported_rows, created_at";

/// SQLite-backed record store.
///
/// A sink session holds the connection for its whole lifetime, so concurrent ingestions are
/// serialized at the transaction boundary.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> SinkResult<()> {
        let conn = self.conn.lock();

        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS upload_file_records (
                id TEXT PRIMARY KEY,
                original_filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                total_rows INTEGER NOT NULL DEFAULT 0,
                imported_rows INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_upload_file_records_status ON upload_file_records(status);
            CREATE INDEX IF NOT EXISTS idx_upload_file_records_created_at ON upload_file_records(created_at);

            CREATE TABLE IF NOT EXISTS imported_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (file_id, row_index)
            );
            "#,
        )?;
        Ok(())
    }
}

struct SqliteSink<'a> {
    conn: MutexGuard<'a, Connection>,
    open: Option<FileId>,
}

impl SqliteSink<'_> {
    fn require_open(&self, file_id: &FileId) -> SinkResult<()> {
        match &self.open {
            None => Err(SinkError::transaction("no open file transaction")),
            Some(open) if open != file_id => Err(SinkError::transaction(format!(
                "row for file {file_id} written inside transaction for file {open}"
            ))),
            Some(_) => Ok(()),
        }
    }
}

impl RecordSink for SqliteSink<'_> {
    fn begin_file_transaction(&mut self, file_id: &FileId) -> SinkResult<()> {
        if let Some(open) = &self.open {
            return Err(SinkError::transaction(format!(
                "transaction for file {open} is still open"
            )));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.open = Some(*file_id);
        Ok(())
    }

    fn write_row(&mut self, file_id: &FileId, index: u64, fields: &Fields) -> SinkResult<()> {
        self.require_open(file_id)?;
        let data = serde_json::to_string(fields)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO imported_data (file_id, row_index, data, created_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![file_id.to_string(), index as i64, data, timestamp(&Utc::now())])?;
        Ok(())
    }

    // Statements already run inside the open transaction; nothing is visible before COMMIT.
    fn flush(&mut self) -> SinkResult<()> {
        match &self.open {
            Some(_) => Ok(()),
            None => Err(SinkError::transaction("no open file transaction")),
        }
    }

    fn commit(&mut self) -> SinkResult<()> {
        if self.open.is_none() {
            return Err(SinkError::transaction("no open file transaction"));
        }
        self.conn.execute_batch("COMMIT")?;
        self.open = None;
        Ok(())
    }

    fn rollback(&mut self) -> SinkResult<()> {
        if self.open.take().is_some() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn put_file_record(&mut self, record: &FileRecord) -> SinkResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO upload_file_records (
                id, original_filename, file_type, file_size, file_path, status, message,
                total_rows, imported_rows, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                message = excluded.message,
                total_rows = excluded.total_rows,
                imported_rows = excluded.imported_rows
            "#,
            params![
                record.id.to_string(),
                record.original_name,
                record.extension,
                record.size as i64,
                record.location.as_str(),
                record.status.as_str(),
                record.message,
                record.total_rows as i64,
                record.imported_rows as i64,
                timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }
}

impl Drop for SqliteSink<'_> {
    fn drop(&mut self) {
        if self.open.take().is_some() {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

impl RecordStore for SqliteStore {
    fn sink(&self) -> SinkResult<Box<dyn RecordSink + '_>> {
        Ok(Box::new(SqliteSink {
            conn: self.conn.lock(),
            open: None,
        }))
    }

    fn file_record(&self, id: &FileId) -> SinkResult<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM upload_file_records WHERE id = ?1"),
                params![id.to_string()],
                row_to_file_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_file_records(&self, query: &FileQuery) -> SinkResult<FilePage> {
        let conn = self.conn.lock();
        let status = query.status.map(|s| s.as_str());

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM upload_file_records WHERE (?1 IS NULL OR status = ?1)",
            params![status],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM upload_file_records \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let items = stmt
            .query_map(
                params![status, query.limit as i64, query.skip as i64],
                row_to_file_record,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FilePage {
            total: total as u64,
            items,
        })
    }

    fn rows(&self, id: &FileId, skip: usize, limit: usize) -> SinkResult<Vec<NormalizedRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT row_index, data FROM imported_data WHERE file_id = ?1 \
             ORDER BY row_index LIMIT ?2 OFFSET ?3",
        )?;
        let raw = stmt
            .query_map(params![id.to_string(), limit as i64, skip as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(row_index, data)| {
                Ok(NormalizedRow {
                    file_id: *id,
                    row_index: row_index as u64,
                    fields: serde_json::from_str::<Fields>(&data)?,
                })
            })
            .collect()
    }

    fn row_count(&self, id: &FileId) -> SinkResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_data WHERE file_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn remove_file(&self, id: &FileId) -> SinkResult<Option<FileRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let record = tx
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM upload_file_records WHERE id = ?1"),
                params![id.to_string()],
                row_to_file_record,
            )
            .optional()?;
        if record.is_some() {
            tx.execute("DELETE FROM imported_data WHERE file_id = ?1", params![id.to_string()])?;
            tx.execute("DELETE FROM upload_file_records WHERE id = ?1", params![id.to_string()])?;
        }
        tx.commit()?;
        Ok(record)
    }

    fn stats(&self) -> SinkResult<IngestStats> {
        let mut stats = IngestStats::default();
        {
            let conn = self.conn.lock();

            let total_files: i64 = conn.query_row("SELECT COUNT(*) FROM upload_file_records", [], |row| row.get(0))?;
            let total_rows: i64 = conn.query_row("SELECT COUNT(*) FROM imported_data", [], |row| row.get(0))?;
            stats.total_files = total_files as u64;
            stats.total_rows = total_rows as u64;

            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM upload_file_records GROUP BY status")?;
            let by_status = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (status, count) in by_status {
                let count = count as u64;
                match FileStatus::from_str(&status) {
                    Ok(FileStatus::Completed) => stats.completed += count,
                    Ok(FileStatus::Failed) => stats.failed += count,
                    Ok(FileStatus::Processing) => stats.processing += count,
                    Ok(FileStatus::Pending) => stats.pending += count,
                    Err(message) => return Err(SinkError::Backend { message }),
                }
            }

            let mut stmt = conn.prepare(
                "SELECT file_type, COUNT(*) FROM upload_file_records GROUP BY file_type ORDER BY file_type",
            )?;
            stats.file_types = stmt
                .query_map([], |row| {
                    Ok(FileTypeCount {
                        file_type: row.get(0)?,
                        count: row.get::<_, i64>(1)? as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
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

// Fixed-width UTC timestamps so `ORDER BY created_at` sorts chronologically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(9)?;

    let id = FileId::from_str(&id_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let status = FileStatus::from_str(&status_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(FileRecord {
        id,
        original_name: row.get(1)?,
        extension: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        location: Location::new(row.get::<_, String>(4)?),
        status,
        message: row.get(6)?,
        total_rows: row.get::<_, i64>(7)? as u64,
        imported_rows: row.get::<_, i64>(8)? as u64,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(n: i64) -> Fields {
        [("n", n)].into_iter().collect()
    }

    #[test]
    fn committed_rows_round_trip_through_json() {
        let store = SqliteStore::in_memory().unwrap();
        let id = FileId::new();
        let mut record = FileRecord::processing(id, "people.csv", "csv", 12, Location::new("/tmp/x.csv"));

        {
            let mut sink = store.sink().unwrap();
            sink.put_file_record(&record).unwrap();
            sink.begin_file_transaction(&id).unwrap();
            let mut row = fields(1);
            row.insert("name", "Ada");
            row.insert("missing", crate::types::Value::Null);
            sink.write_row(&id, 1, &row).unwrap();
            sink.write_row(&id, 2, &fields(2)).unwrap();
            record.complete(2, 2);
            sink.put_file_record(&record).unwrap();
            sink.commit().unwrap();
        }

        let stored = store.file_record(&id).unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Completed);
        assert_eq!(stored.imported_rows, 2);

        let rows = store.rows(&id, 0, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields.names().collect::<Vec<_>>(), vec!["n", "name", "missing"]);
        assert_eq!(rows[0].fields.get("missing"), Some(&crate::types::Value::Null));
        assert_eq!(rows[1].row_index, 2);
    }

    #[test]
    fn dropping_an_open_sink_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        let id = FileId::new();
        {
            let mut sink = store.sink().unwrap();
            sink.begin_file_transaction(&id).unwrap();
            sink.write_row(&id, 1, &fields(1)).unwrap();
        }
        assert_eq!(store.row_count(&id).unwrap(), 0);
    }

    #[test]
    fn remove_file_cascades_to_rows() {
        let store = SqliteStore::in_memory().unwrap();
        let id = FileId::new();
        {
            let mut sink = store.sink().unwrap();
            sink.begin_file_transaction(&id).unwrap();
            sink.write_row(&id, 1, &fields(1)).unwrap();
            sink.put_file_record(&FileRecord::processing(id, "a.txt", "txt", 1, Location::new("x")))
                .unwrap();
            sink.commit().unwrap();
        }

        assert!(store.remove_file(&id).unwrap().is_some());
        assert_eq!(store.row_count(&id).unwrap(), 0);
        assert!(store.remove_file(&id).unwrap().is_none());
        assert_eq!(store.stats().unwrap().total_files, 0);
    }
}
