use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SettingsStore, StoreError, StoredEntry};

const STORE_VERSION: u32 = 1;

/// Get the default store file path (e.g. ~/.local/share/unit-manager/store.json)
pub fn get_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("unit-manager").join("store.json"))
        .unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}/.local/share/unit-manager/store.json",
                std::env::var("HOME").unwrap_or_default()
            ))
        })
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

impl StoreDocument {
    fn new() -> Self {
        Self {
            version: STORE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Settings store kept in a single JSON document.
///
/// Every write rewrites the document atomically, so a crash never leaves a
/// half-written file behind.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn load(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::new());
        }

        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let doc: StoreDocument = serde_json::from_reader(file)?;

        if doc.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion(doc.version));
        }

        Ok(doc)
    }

    fn save(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = AtomicWriteFile::open(&self.path).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut file, doc)?;
        file.commit().map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn store(&self, key: &str, value: Value, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load()?;
        doc.entries.insert(
            key.to_string(),
            StoredEntry {
                data: value,
                timestamp,
            },
        );
        self.save(&doc)
    }

    fn restore(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.entries.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;

    #[test]
    fn test_restore_missing_file_returns_none() {
        let temp_path = env::temp_dir().join("unit_manager_store_missing.json");
        let _ = std::fs::remove_file(&temp_path);

        let store = FileStore::new(temp_path);
        assert!(store.restore("1/unit_list/Prices").unwrap().is_none());
    }

    #[test]
    fn test_store_and_restore_roundtrip() {
        let temp_path = env::temp_dir().join("unit_manager_store_roundtrip.json");
        let _ = std::fs::remove_file(&temp_path);

        let store = FileStore::new(temp_path.clone());
        let now = Utc::now();
        store
            .store("1/unit_list/FilterUnits", json!({"a": 1}), now)
            .unwrap();
        store
            .store("1/unit_list/Prices", json!([{"unitId": 3}]), now)
            .unwrap();
        store
            .store("1/unit_list/FilterUnits", json!({"a": 2}), now)
            .unwrap();

        let reopened = FileStore::new(temp_path.clone());
        let filters = reopened.restore("1/unit_list/FilterUnits").unwrap().unwrap();
        assert_eq!(filters.data, json!({"a": 2}));
        assert_eq!(filters.timestamp, now);
        assert!(reopened.restore("1/unit_list/Prices").unwrap().is_some());

        let _ = std::fs::remove_file(&temp_path);
    }

    #[test]
    fn test_unsupported_version_is_an_error() {
        let temp_path = env::temp_dir().join("unit_manager_store_version.json");
        std::fs::write(&temp_path, r#"{"version": 7, "entries": {}}"#).unwrap();

        let store = FileStore::new(temp_path.clone());
        assert!(matches!(
            store.restore("any"),
            Err(StoreError::UnsupportedVersion(7))
        ));

        let _ = std::fs::remove_file(&temp_path);
    }
}
