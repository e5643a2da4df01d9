//! Result persistence

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sink for evaluation and batch results.
///
/// Callers log failures and carry on; a store error never fails an
/// evaluation.
pub trait ResultStore: Send + Sync {
    fn save_result(&self, result: &Value) -> Result<(), StoreError>;
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullStore;

impl ResultStore for NullStore {
    fn save_result(&self, _result: &Value) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Appends results to a JSON array on disk.
///
/// A missing or unreadable file starts a fresh array.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Everything saved so far
    pub fn load_all(&self) -> Result<Vec<Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ResultStore for JsonFileStore {
    fn save_result(&self, result: &Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut entries = match self.load_all() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Starting fresh results file {}: {}", self.path.display(), e);
                Vec::new()
            }
        };
        entries.push(result.clone());

        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        tracing::debug!("Saved result to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_appends_to_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("evaluations.json"));

        store.save_result(&json!({"id": "a", "final_score": 0.8})).unwrap();
        store.save_result(&json!({"id": "b", "final_score": 0.4})).unwrap();

        let saved = store.load_all().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0]["id"], "a");
        assert_eq!(saved[1]["id"], "b");
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evaluations.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        store.save_result(&json!({"id": "a"})).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![json!({"id": "a"})]);
    }

    #[test]
    fn test_null_store_accepts_everything() {
        assert!(NullStore.save_result(&json!({"anything": true})).is_ok());
    }
}
