use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_STORE_PATH: &str = "./data/status.db";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<String>,
    pub database_url: Option<String>,
}

/// Where the status store lives after applying environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub database_url: Option<String>,
}

impl Config {
    /// `BACKUP_STATUS_PATH` and `DATABASE_URL` win over the file.
    pub fn store_location(&self, env: impl Fn(&str) -> Option<String>) -> StoreLocation {
        let path = env("BACKUP_STATUS_PATH")
            .or_else(|| self.storage.path.clone())
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_owned());
        let database_url = env("DATABASE_URL").or_else(|| self.storage.database_url.clone());
        StoreLocation {
            path: PathBuf::from(path),
            database_url,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
    toml::from_str(&contents).with_context(|| format!("parsing config file {path:?}"))
}
