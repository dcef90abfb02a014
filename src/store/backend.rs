//! Document backends
//!
//! `JsonFileBackend` persists the document as pretty-printed JSON with an
//! atomic replace (temp file + rename). `MemoryBackend` keeps it in RAM for
//! tests.

use super::document::Document;
use super::StoreError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Raw load/save of the whole document
pub trait DocumentBackend: Send + Sync {
    /// Returns `Ok(None)` when nothing has been persisted yet
    fn load(&self) -> Result<Option<Document>, StoreError>;

    /// Full overwrite
    fn save(&self, document: &Document) -> Result<(), StoreError>;
}

/// JSON file on local disk
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let document = serde_json::from_str(&contents)?;
        Ok(Some(document))
    }

    fn save(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target so the rename stays on one filesystem
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory backend for tests
#[derive(Default)]
pub struct MemoryBackend {
    document: Mutex<Option<Document>>,
    fail_saves: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            fail_saves: Mutex::new(false),
        }
    }

    /// Make every subsequent save fail with an I/O error
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_saves.lock() {
            *flag = fail;
        }
    }

    /// Last persisted document, if any
    pub fn persisted(&self) -> Option<Document> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        let guard = self
            .document
            .lock()
            .map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, document: &Document) -> Result<(), StoreError> {
        let fail = self.fail_saves.lock().map(|f| *f).unwrap_or(false);
        if fail {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated write failure",
            )));
        }

        let mut guard = self
            .document
            .lock()
            .map_err(|_| StoreError::Poisoned)?;
        *guard = Some(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::traits::UserId;
    use tempfile::TempDir;

    #[test]
    fn test_json_backend_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("members.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_json_backend_save_and_load() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested").join("members.json"));

        let mut doc = Document::default();
        doc.global_admins.insert(UserId(1190237801));
        backend.save(&doc).unwrap();

        assert_eq!(backend.load().unwrap(), Some(doc));
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_json_backend_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.json");
        fs::write(&path, "{ not json").unwrap();

        let backend = JsonFileBackend::new(&path);
        assert!(matches!(
            backend.load(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_memory_backend_failing_saves() {
        let backend = MemoryBackend::new();
        backend.set_fail_saves(true);
        assert!(backend.save(&Document::default()).is_err());
        assert!(backend.persisted().is_none());
    }
}
