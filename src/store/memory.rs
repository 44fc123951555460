use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{SettingsStore, StoreError, StoredEntry};

/// Process-local store, used for dry runs and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl SettingsStore for MemoryStore {
    fn store(&self, key: &str, value: Value, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            StoredEntry {
                data: value,
                timestamp,
            },
        );
        Ok(())
    }

    fn restore(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{restore_json, store_json};

    #[test]
    fn test_typed_roundtrip() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store_json(&store, "k", &vec![1u32, 2, 3], now).unwrap();

        let restored = restore_json::<Vec<u32>>(&store, "k").unwrap().unwrap();
        assert_eq!(restored.data, vec![1, 2, 3]);
        assert_eq!(restored.timestamp, now);
        assert!(restore_json::<Vec<u32>>(&store, "missing").unwrap().is_none());
        assert_eq!(store.keys(), vec!["k"]);
    }
}
