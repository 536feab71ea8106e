use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::types::{FileId, Location};

use super::FileStore;

/// Stores each upload as `<root>/<id>.<extension>`.
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    /// Use `root` as the upload directory, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl FileStore for DiskFileStore {
    fn save(&self, id: &FileId, extension: &str, bytes: &[u8]) -> io::Result<Location> {
        let path = self.root.join(format!("{id}.{extension}"));
        fs::write(&path, bytes)?;
        Ok(Location::new(path.to_string_lossy()))
    }

    fn delete(&self, location: &Location) -> io::Result<()> {
        fs::remove_file(location.as_str())
    }
}

/// Keeps uploads in memory. Useful for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<Location, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes stored at `location`.
    pub fn get(&self, location: &Location) -> Option<Vec<u8>> {
        self.files.lock().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn save(&self, id: &FileId, extension: &str, bytes: &[u8]) -> io::Result<Location> {
        let location = Location::new(format!("memory://{id}.{extension}"));
        self.files.lock().insert(location.clone(), bytes.to_vec());
        Ok(location)
    }

    fn delete(&self, location: &Location) -> io::Result<()> {
        match self.files.lock().remove(location) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no stored file at {location}"),
            )),
        }
    }
}
