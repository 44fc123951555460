pub mod file;
pub mod memory;

pub use file::{get_store_path, FileStore};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted blob with the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry<T = Value> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access settings store at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unsupported settings store version: {0}")]
    UnsupportedVersion(u32),
}

/// Key/blob persistence. Writes are last-write-wins.
pub trait SettingsStore: Send + Sync {
    fn store(&self, key: &str, value: Value, timestamp: DateTime<Utc>) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing has been stored under the key
    fn restore(&self, key: &str) -> Result<Option<StoredEntry>, StoreError>;
}

/// Serialize and store a typed value
pub fn store_json<T: Serialize>(
    store: &dyn SettingsStore,
    key: &str,
    value: &T,
    timestamp: DateTime<Utc>,
) -> Result<(), StoreError> {
    store.store(key, serde_json::to_value(value)?, timestamp)
}

/// Restore and deserialize a typed value
pub fn restore_json<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &str,
) -> Result<Option<StoredEntry<T>>, StoreError> {
    match store.restore(key)? {
        Some(entry) => Ok(Some(StoredEntry {
            data: serde_json::from_value(entry.data)?,
            timestamp: entry.timestamp,
        })),
        None => Ok(None),
    }
}
