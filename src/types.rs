//! Core data model types for ingestion.
//!
//! Rows are schema-free: every [`NormalizedRow`] carries an ordered list of named [`Value`]s,
//! and a [`FileRecord`] tracks the outcome of one uploaded file.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single dynamically-typed value in a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Ordered list of values (structured-object input only).
    List(Vec<Value>),
    /// Nested object (structured-object input only).
    Map(Fields),
}

impl Value {
    /// Borrow the string payload, if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else {
                    // u64 beyond i64::MAX or a real float.
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Utf8(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Map(Fields::from(map)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Utf8(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Float64(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float64(_) => serializer.serialize_unit(),
            Value::Utf8(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => fields.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Ordered field-name → [`Value`] mapping for one row.
///
/// Insertion order is preserved (CSV header order, JSON declaration order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    /// Create an empty field list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty field list with room for `n` entries.
    pub fn with_capacity(n: usize) -> Self {
        Self(Vec::with_capacity(n))
    }

    /// Insert a field, replacing the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Append a field whose name is known to be unique in this list.
    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push((name.into(), value.into()));
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Fields::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Fields {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Fields(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Map::<String, serde_json::Value>::deserialize(deserializer).map(Fields::from)
    }
}

/// Opaque identity of an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque, write-once handle returned by a [`crate::storage::FileStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Wrap a backend-specific location string.
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a [`FileRecord`].
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    /// Stable lower-case name used in storage and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "processing" => Ok(FileStatus::Processing),
            "completed" => Ok(FileStatus::Completed),
            "failed" => Ok(FileStatus::Failed),
            other => Err(format!("unknown file status '{other}'")),
        }
    }
}

/// Tracking record for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Name as declared by the uploader.
    pub original_name: String,
    /// Lower-case extension without the leading dot.
    pub extension: String,
    /// Raw upload size in bytes.
    pub size: u64,
    pub location: Location,
    pub total_rows: u64,
    pub imported_rows: u64,
    pub status: FileStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// A freshly accepted upload, status `processing`.
    pub fn processing(
        id: FileId,
        original_name: impl Into<String>,
        extension: impl Into<String>,
        size: u64,
        location: Location,
    ) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            extension: extension.into(),
            size,
            location,
            total_rows: 0,
            imported_rows: 0,
            status: FileStatus::Processing,
            message: None,
            created_at: Utc::now(),
        }
    }

    /// Transition to `completed` with final counts.
    pub fn complete(&mut self, total_rows: u64, imported_rows: u64) {
        self.total_rows = total_rows;
        self.imported_rows = imported_rows;
        self.status = FileStatus::Completed;
        self.message = Some(format!("imported {imported_rows} rows"));
    }

    /// Transition to `failed`. Nothing stays visible, so `imported_rows` is reset to zero.
    pub fn fail(&mut self, total_rows: u64, message: impl Into<String>) {
        self.total_rows = total_rows;
        self.imported_rows = 0;
        self.status = FileStatus::Failed;
        self.message = Some(message.into());
    }

    /// Human readable size, e.g. `1.5MB`.
    pub fn size_label(&self) -> String {
        format_size(self.size)
    }

    /// Derived progress view.
    pub fn progress(&self) -> ProgressInfo {
        let fraction = if self.total_rows > 0 {
            self.imported_rows as f64 / self.total_rows as f64
        } else {
            0.0
        };
        ProgressInfo {
            file_id: self.id,
            file_name: self.original_name.clone(),
            status: self.status,
            total_rows: self.total_rows,
            imported_rows: self.imported_rows,
            fraction,
            message: self.message.clone(),
        }
    }
}

/// Format a byte count using 1024-based units with one decimal place.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}TB")
}

/// One persisted row of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub file_id: FileId,
    /// 1-based, contiguous within a file.
    pub row_index: u64,
    pub fields: Fields,
}

/// Outcome of a single `ingest` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestResult {
    pub file_id: FileId,
    /// Rows discovered in the input (before any truncation).
    pub total_rows: u64,
    /// Rows durably committed.
    pub imported_rows: u64,
    /// Always terminal.
    pub status: FileStatus,
    pub error: Option<String>,
}

impl IngestResult {
    pub(crate) fn from_record(record: &FileRecord) -> Self {
        let error = match record.status {
            FileStatus::Failed => record.message.clone(),
            _ => None,
        };
        Self {
            file_id: record.id,
            total_rows: record.total_rows,
            imported_rows: record.imported_rows,
            status: record.status,
            error,
        }
    }
}

/// Read-only progress view derived from a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressInfo {
    pub file_id: FileId,
    pub file_name: String,
    pub status: FileStatus,
    pub total_rows: u64,
    pub imported_rows: u64,
    /// `imported_rows / total_rows`, or `0.0` when `total_rows` is zero.
    pub fraction: f64,
    pub message: Option<String>,
}

impl ProgressInfo {
    /// Completion as a percentage rounded to two decimals.
    pub fn percent(&self) -> f64 {
        (self.fraction * 10_000.0).round() / 100.0
    }
}

/// Default page size for listings.
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest accepted page size for listings.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Paging and filtering for file listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    pub skip: usize,
    pub limit: usize,
    pub status: Option<FileStatus>,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
        }
    }
}

/// One page of file records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePage {
    /// Matching records before paging.
    pub total: u64,
    pub items: Vec<FileRecord>,
}

/// One page of a file's rows, ordered by row index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowPage {
    pub file_id: FileId,
    pub file_name: String,
    pub total: u64,
    pub skip: usize,
    pub limit: usize,
    pub items: Vec<NormalizedRow>,
}

/// Upload count for one file type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTypeCount {
    pub file_type: String,
    pub count: u64,
}

/// Aggregate counters over everything in a record store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub total_files: u64,
    pub total_rows: u64,
    pub completed: u64,
    pub failed: u64,
    pub processing: u64,
    pub pending: u64,
    /// Sorted by file type.
    pub file_types: Vec<FileTypeCount>,
    /// Most recent uploads, newest first.
    pub recent: Vec<FileRecord>,
}

/// Number of records reported in [`IngestStats::recent`].
pub const RECENT_UPLOADS: usize = 5;
