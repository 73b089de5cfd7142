use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::record_key;

/// Identifies a backup source: one collection inside one database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    pub database: String,
    pub collection: String,
}

impl CollectionRef {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Storage key for this source. See [`record_key`].
    pub fn record_key(&self) -> String {
        record_key(&self.database, &self.collection)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.collection)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

/// Outcome of one backup run for one collection.
///
/// Optional fields are skipped when empty and default when missing, so
/// records written before a field existed keep decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupResult {
    pub collection: CollectionRef,
    pub run_id: Uuid,
    pub kind: BackupKind,
    pub status: BackupStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: u64,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

impl BackupResult {
    pub fn succeeded(
        collection: CollectionRef,
        kind: BackupKind,
        started_at: DateTime<Utc>,
        rows: u64,
        size_bytes: u64,
    ) -> Self {
        Self {
            collection,
            run_id: Uuid::new_v4(),
            kind,
            status: BackupStatus::Ok,
            started_at,
            finished_at: Utc::now(),
            rows,
            size_bytes,
            error: None,
            checkpoint: None,
        }
    }

    pub fn failed(
        collection: CollectionRef,
        kind: BackupKind,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            run_id: Uuid::new_v4(),
            kind,
            status: BackupStatus::Failed,
            started_at,
            finished_at: Utc::now(),
            rows: 0,
            size_bytes: 0,
            error: Some(error.into()),
            checkpoint: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == BackupStatus::Ok
    }
}
