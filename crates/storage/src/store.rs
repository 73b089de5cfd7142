use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use backup_status_core::{BackupResult, CollectionRef};

use crate::error::{StatusError, StatusResult};
use crate::postgres_store::PostgresStatusStore;
use crate::sqlite_store::SqliteStatusStore;

/// Latest backup outcome per collection, implemented by the SQLite, Postgres
/// and in-memory backends.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Record `result` under its collection's key, replacing any previous one.
    async fn save(&self, result: &BackupResult) -> StatusResult<()>;

    /// Most recent result for `collection`; `NotFound` if none was saved.
    async fn get(&self, collection: &CollectionRef) -> StatusResult<BackupResult>;

    /// Release the backend. Every later call fails with `Closed`.
    async fn close(&self) -> StatusResult<()>;
}

/// Opens the Postgres backend when a database URL is given, the SQLite file
/// at `path` otherwise.
pub async fn open_status_store(
    path: &Path,
    database_url: Option<&str>,
) -> StatusResult<Arc<dyn StatusStore>> {
    match database_url {
        Some(url) => Ok(Arc::new(PostgresStatusStore::new(url).await?)),
        None => {
            let owned = path.to_path_buf();
            let store = tokio::task::spawn_blocking(move || SqliteStatusStore::open(&owned))
                .await
                .map_err(|e| StatusError::init(path, e))??;
            Ok(Arc::new(store))
        }
    }
}
