//! File-based key-value backend.
//!
//! # Directory Structure
//!
//! ```text
//! data/
//! ├── offline_edit_doc_doc-1.json
//! ├── offline_edit_doc_notes%2Ftodo.json
//! └── offline_edit_sync_queue.json
//! ```
//!
//! Each key is one file whose name is the URL-encoded key. Writes go to a
//! temporary sibling first and are renamed into place, so a crash mid-write
//! leaves the previous value intact.

use crate::{KvBackend, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// File-based implementation of `KvBackend`
#[derive(Debug, Clone)]
pub struct FileBackend {
    /// Directory holding one file per key
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", urlencoding::encode(key), RECORD_EXTENSION))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        let temp = path.with_extension(TEMP_EXTENSION);
        fs::write(&temp, value)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(key) if key.starts_with(prefix) => keys.push(key.into_owned()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Skipping undecodable file name {:?}: {}", path, e);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
