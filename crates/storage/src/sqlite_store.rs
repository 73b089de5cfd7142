use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backup_status_core::{BackupResult, CollectionRef};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StatusError, StatusResult};
use crate::store::StatusStore;

/// SQLite-backed status store in a single file.
///
/// The connection runs in exclusive locking mode, so the file stays locked
/// until [`StatusStore::close`] (or drop) and a second open of the same path
/// fails instead of waiting.
pub struct SqliteStatusStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStatusStore {
    /// Opens or creates the store at `db_path`. Safe to call on every start.
    pub fn open(db_path: &Path) -> StatusResult<Self> {
        create_parent_dir(db_path).map_err(|e| StatusError::init(db_path, e))?;
        create_db_file(db_path).map_err(|e| StatusError::init(db_path, e))?;

        let conn = Connection::open(db_path).map_err(|e| StatusError::init(db_path, e))?;
        init_db(&conn).map_err(|e| StatusError::init(db_path, e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }
}

fn create_parent_dir(db_path: &Path) -> std::io::Result<()> {
    let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(parent)
}

// An empty file is a valid empty database; creating it here pins the mode.
// An existing file is never opened: closing any descriptor to it would drop
// the POSIX locks another handle in this process holds.
fn create_db_file(db_path: &Path) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(db_path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::ZERO)?;
    conn.pragma_update_and_check(None, "locking_mode", "EXCLUSIVE", |row| {
        row.get::<_, String>(0)
    })?;
    // BEGIN EXCLUSIVE takes the file lock; exclusive mode keeps it after COMMIT.
    conn.execute_batch(
        "BEGIN EXCLUSIVE;
         CREATE TABLE IF NOT EXISTS results (
             key TEXT PRIMARY KEY NOT NULL,
             value TEXT NOT NULL
         );
         COMMIT;",
    )
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    async fn save(&self, result: &BackupResult) -> StatusResult<()> {
        let key = result.collection.record_key();
        let value = serde_json::to_string(result).map_err(|source| StatusError::Encoding {
            key: key.clone(),
            source,
        })?;

        let conn = Arc::clone(&self.conn);
        let task_key = key.clone();
        tokio::task::spawn_blocking(move || {
            let key = task_key;
            let mut guard = conn.lock();
            let conn = (*guard).as_mut().ok_or(StatusError::Closed)?;
            let tx = conn.transaction().map_err(|e| StatusError::write(&key, e))?;
            tx.execute(
                "INSERT INTO results (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|e| StatusError::write(&key, e))?;
            tx.commit().map_err(|e| StatusError::write(&key, e))
        })
        .await
        .map_err(|e| StatusError::write(&key, e))?
    }

    async fn get(&self, collection: &CollectionRef) -> StatusResult<BackupResult> {
        let key = collection.record_key();
        let conn = Arc::clone(&self.conn);
        let task_key = key.clone();
        let raw = tokio::task::spawn_blocking(move || {
            let key = task_key;
            let guard = conn.lock();
            let conn = (*guard).as_ref().ok_or(StatusError::Closed)?;
            conn.query_row("SELECT value FROM results WHERE key = ?1", [&key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| StatusError::read(&key, e))
        })
        .await
        .map_err(|e| StatusError::read(&key, e))??;

        let raw = raw.ok_or_else(|| StatusError::NotFound { key: key.clone() })?;
        serde_json::from_str(&raw).map_err(|source| StatusError::Decoding { key, source })
    }

    async fn close(&self) -> StatusResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().take().ok_or(StatusError::Closed)?;
            conn.close().map_err(|(_, e)| StatusError::Shutdown { source: e.into() })
        })
        .await
        .map_err(|e| StatusError::Shutdown { source: e.into() })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_status_core::BackupKind;
    use chrono::{TimeZone, Utc};

    fn sample(database: &str, collection: &str, rows: u64) -> BackupResult {
        let started_at = Utc.with_ymd_and_hms(2026, 2, 13, 1, 0, 0).unwrap();
        BackupResult::succeeded(
            CollectionRef::new(database, collection),
            BackupKind::Full,
            started_at,
            rows,
            rows * 64,
        )
    }

    #[tokio::test]
    async fn save_then_get_round_trips_every_field() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");

        let result = sample("orders", "items", 1000).with_checkpoint("oplog:42");
        store.save(&result).await.expect("save");

        let loaded = store.get(&result.collection).await.expect("get");
        assert_eq!(loaded, result);
    }

    #[tokio::test]
    async fn later_save_overwrites_earlier() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");

        let first = sample("orders", "items", 1);
        let second = sample("orders", "items", 2);
        store.save(&first).await.expect("save first");
        store.save(&second).await.expect("save second");

        let loaded = store.get(&first.collection).await.expect("get");
        assert_eq!(loaded.run_id, second.run_id);
        assert_eq!(loaded.rows, 2);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");

        let err = store
            .get(&CollectionRef::new("orders", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn keys_for_sibling_collections_are_independent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");

        let y = sample("alpha", "y", 7);
        store.save(&y).await.expect("save y");
        store.save(&sample("alpha", "x", 1)).await.expect("save x");

        let loaded = store.get(&CollectionRef::new("alpha", "y")).await.expect("get y");
        assert_eq!(loaded, y);
    }

    #[tokio::test]
    async fn names_containing_separator_do_not_collide() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");

        let left = sample("a/b", "c", 1);
        let right = sample("a", "b/c", 2);
        store.save(&left).await.expect("save left");
        store.save(&right).await.expect("save right");

        assert_eq!(store.get(&left.collection).await.expect("left"), left);
        assert_eq!(store.get(&right.collection).await.expect("right"), right);
    }

    #[tokio::test]
    async fn reopen_creates_nothing_new_and_keeps_records() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join("dir").join("status.db");

        let store = SqliteStatusStore::open(&path).expect("first open");
        let result = sample("orders", "items", 1000);
        store.save(&result).await.expect("save");
        store.close().await.expect("close");

        let store = SqliteStatusStore::open(&path).expect("second open");
        assert_eq!(store.get(&result.collection).await.expect("get"), result);
        store.close().await.expect("close again");
    }

    #[tokio::test]
    async fn calls_after_close_fail_with_closed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");
        store.close().await.expect("close");

        let result = sample("orders", "items", 1);
        assert!(store.save(&result).await.unwrap_err().is_closed());
        assert!(store.get(&result.collection).await.unwrap_err().is_closed());
        assert!(store.close().await.unwrap_err().is_closed());
    }

    #[test]
    fn second_open_of_locked_file_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("status.db");
        let _held = SqliteStatusStore::open(&path).expect("first open");

        match SqliteStatusStore::open(&path) {
            Err(StatusError::Initialization { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second open must fail while the file is locked"),
        }
    }

    #[tokio::test]
    async fn corrupt_record_is_a_decoding_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open");
        let guard = store.conn.lock();
        (*guard)
            .as_ref()
            .expect("open connection")
            .execute(
                "INSERT INTO results (key, value) VALUES ('orders/items', 'not json')",
                [],
            )
            .expect("insert garbage");
        drop(guard);

        let err = store
            .get(&CollectionRef::new("orders", "items"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::Decoding { ref key, .. } if key == "orders/items"));
    }

    #[tokio::test]
    async fn concurrent_saves_all_commit() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SqliteStatusStore::open(&tmp.path().join("status.db")).expect("open"));

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let result = sample("metrics", &format!("c{i}"), i);
                store.save(&result).await.map(|_| result)
            }));
        }

        for handle in handles {
            let saved = handle.await.expect("join").expect("save");
            let loaded = store.get(&saved.collection).await.expect("get");
            assert_eq!(loaded, saved);
        }
    }

    #[cfg(unix)]
    #[test]
    fn backing_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("state").join("status.db");
        let _store = SqliteStatusStore::open(&path).expect("open");

        let file_mode = fs::metadata(&path).expect("file").permissions().mode() & 0o777;
        let dir_mode = fs::metadata(path.parent().unwrap())
            .expect("dir")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(file_mode & 0o077, 0);
        assert_eq!(dir_mode & 0o077, 0);
    }
}
