use std::path::PathBuf;

use thiserror::Error;

/// Underlying backend failure, boxed so each backend can surface its own type.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type StatusResult<T> = Result<T, StatusError>;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("initialize status store at {}", path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("encode backup result for {key}")]
    Encoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("decode backup result for {key}")]
    Decoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("write backup result for {key}")]
    StorageWrite {
        key: String,
        #[source]
        source: BackendError,
    },
    #[error("read backup result for {key}")]
    StorageRead {
        key: String,
        #[source]
        source: BackendError,
    },
    #[error("no backup result recorded for {key}")]
    NotFound { key: String },
    #[error("status store is closed")]
    Closed,
    #[error("close status store")]
    Shutdown {
        #[source]
        source: BackendError,
    },
}

impl StatusError {
    /// True when the key has simply never been saved.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StatusError::NotFound { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StatusError::Closed)
    }

    pub(crate) fn init(path: impl Into<PathBuf>, source: impl Into<BackendError>) -> Self {
        StatusError::Initialization {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(key: &str, source: impl Into<BackendError>) -> Self {
        StatusError::StorageWrite {
            key: key.to_owned(),
            source: source.into(),
        }
    }

    pub(crate) fn read(key: &str, source: impl Into<BackendError>) -> Self {
        StatusError::StorageRead {
            key: key.to_owned(),
            source: source.into(),
        }
    }
}
