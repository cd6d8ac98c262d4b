use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Storage;
use crate::error::StoreError;

/// Directory-backed [`Storage`]: one file per key.
///
/// Key separators (`:`) become `.` so names are valid on every platform.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// The directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.replace(':', "."))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::open(dir.path()).unwrap();
        storage.set_item("gba:meta:abc", "{}").unwrap();
        assert!(dir.path().join("gba.meta.abc").exists());

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get_item("gba:meta:abc").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn missing_key_is_none_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::open(dir.path().join("saves")).unwrap();
        assert_eq!(storage.get_item("gba:state:x:slot:1").unwrap(), None);
        storage.remove_item("gba:state:x:slot:1").unwrap();
        storage.set_item("gba:state:x:slot:1", "AAEC").unwrap();
        storage.remove_item("gba:state:x:slot:1").unwrap();
        assert_eq!(storage.get_item("gba:state:x:slot:1").unwrap(), None);
    }
}
