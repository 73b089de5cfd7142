use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use backup_status_core::{BackupResult, CollectionRef};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::{StatusError, StatusResult};
use crate::store::StatusStore;

/// Postgres-backed status store, for deployments that already run a server.
pub struct PostgresStatusStore {
    pool: PgPool,
    closed: AtomicBool,
}

impl PostgresStatusStore {
    pub async fn new(database_url: &str) -> StatusResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StatusError::init(redact(database_url), e))?;
        let store = Self::from_pool(pool);
        store
            .run_migrations()
            .await
            .map_err(|e| StatusError::init(redact(database_url), e))?;
        Ok(store)
    }

    fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    async fn run_migrations(&self) -> sqlx::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS backup_results (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn ensure_open(&self) -> StatusResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StatusError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for PostgresStatusStore {
    async fn save(&self, result: &BackupResult) -> StatusResult<()> {
        self.ensure_open()?;
        let key = result.collection.record_key();
        let value = serde_json::to_string(result).map_err(|source| StatusError::Encoding {
            key: key.clone(),
            source,
        })?;

        sqlx::query(
            "INSERT INTO backup_results (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(&key)
        .bind(&value)
        .execute(&self.pool)
        .await
        .map_err(|e| StatusError::write(&key, e))?;
        Ok(())
    }

    async fn get(&self, collection: &CollectionRef) -> StatusResult<BackupResult> {
        self.ensure_open()?;
        let key = collection.record_key();
        let row = sqlx::query("SELECT value FROM backup_results WHERE key = $1")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StatusError::read(&key, e))?;

        let row = row.ok_or_else(|| StatusError::NotFound { key: key.clone() })?;
        let raw: String = row
            .try_get("value")
            .map_err(|e| StatusError::read(&key, e))?;
        serde_json::from_str(&raw).map_err(|source| StatusError::Decoding { key, source })
    }

    async fn close(&self) -> StatusResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StatusError::Closed);
        }
        self.pool.close().await;
        Ok(())
    }
}

// Keeps credentials out of error messages.
fn redact(database_url: &str) -> String {
    match database_url.rsplit_once('@') {
        Some((_, host)) => format!("postgres://***@{host}"),
        None => database_url.to_owned(),
    }
}
