use std::fmt;
use std::io::Read;

use anyhow::{Context, Result};
use backup_status_core::{BackupResult, CollectionRef};
use backup_status_storage::StatusStore;

/// Latest result for `collection`, or `None` when it was never backed up.
pub async fn get(
    store: &dyn StatusStore,
    collection: &CollectionRef,
) -> Result<Option<BackupResult>> {
    match store.get(collection).await {
        Ok(result) => Ok(Some(result)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("get status for {collection}")),
    }
}

/// Parses one JSON-encoded result from `reader` and saves it.
pub async fn save_from_reader(
    store: &dyn StatusStore,
    mut reader: impl Read,
) -> Result<BackupResult> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .context("read backup result")?;
    let result: BackupResult = serde_json::from_str(&raw).context("parse backup result JSON")?;
    store
        .save(&result)
        .await
        .with_context(|| format!("save status for {}", result.collection))?;
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Full,
    Incremental,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Full => f.write_str("full"),
            Plan::Incremental => f.write_str("incremental"),
        }
    }
}

/// Incremental only when the last run succeeded and left a checkpoint.
pub fn plan_for(previous: Option<&BackupResult>) -> Plan {
    match previous {
        Some(last) if last.is_ok() && last.checkpoint.is_some() => Plan::Incremental,
        _ => Plan::Full,
    }
}

pub async fn plan(store: &dyn StatusStore, collection: &CollectionRef) -> Result<Plan> {
    let previous = get(store, collection).await?;
    Ok(plan_for(previous.as_ref()))
}
