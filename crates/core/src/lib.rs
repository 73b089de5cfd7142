pub mod backup;
pub mod key;

pub use backup::{BackupKind, BackupResult, BackupStatus, CollectionRef};
pub use key::record_key;
