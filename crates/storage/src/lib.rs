pub mod error;
pub mod memory_store;
pub mod postgres_store;
pub mod sqlite_store;
pub mod store;

pub use error::{BackendError, StatusError, StatusResult};
pub use memory_store::MemoryStatusStore;
pub use postgres_store::PostgresStatusStore;
pub use sqlite_store::SqliteStatusStore;
pub use store::{open_status_store, StatusStore};
