use std::collections::HashMap;

use async_trait::async_trait;
use backup_status_core::{BackupResult, CollectionRef};
use parking_lot::RwLock;

use crate::error::{StatusError, StatusResult};
use crate::store::StatusStore;

/// In-memory status store for tests. Records are kept JSON-encoded, the same
/// way the durable backends store them.
pub struct MemoryStatusStore {
    records: RwLock<Option<HashMap<String, String>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Some(HashMap::new())),
        }
    }

    /// Number of stored records; zero once closed.
    pub fn len(&self) -> usize {
        let guard = self.records.read();
        (*guard).as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn save(&self, result: &BackupResult) -> StatusResult<()> {
        let key = result.collection.record_key();
        let value = serde_json::to_string(result).map_err(|source| StatusError::Encoding {
            key: key.clone(),
            source,
        })?;
        let mut guard = self.records.write();
        let records = (*guard).as_mut().ok_or(StatusError::Closed)?;
        records.insert(key, value);
        Ok(())
    }

    async fn get(&self, collection: &CollectionRef) -> StatusResult<BackupResult> {
        let key = collection.record_key();
        let raw = {
            let guard = self.records.read();
            let records = (*guard).as_ref().ok_or(StatusError::Closed)?;
            records.get(&key).cloned()
        };
        let raw = raw.ok_or_else(|| StatusError::NotFound { key: key.clone() })?;
        serde_json::from_str(&raw).map_err(|source| StatusError::Decoding { key, source })
    }

    async fn close(&self) -> StatusResult<()> {
        self.records
            .write()
            .take()
            .map(drop)
            .ok_or(StatusError::Closed)
    }
}
