//! SQLite storage layer for BDPA.
//!
//! Two durable stores share one on-device database file:
//!
//! - [`RecordStore`] holds the domain records (avances, mediciones) with
//!   their sync status and soft-delete tombstones
//! - [`SyncQueue`] holds the ordered list of pending remote mutations with
//!   per-item retry state
//!
//! Every mutation is committed before the call returns, so queue and record
//! state survive process restarts while offline. Both stores are mutated
//! only from the main cooperative flow (UI write paths and the sync engine).

mod error;
mod queue;
mod record_store;

pub use error::{StorageError, StorageResult};
pub use queue::{QueueItemUpdate, SyncQueue};
pub use record_store::{RecordStore, StoredRecord};

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Opens the shared database connection used by both stores.
///
/// WAL journaling keeps the write paths from blocking reads; busy_timeout
/// covers the brief overlap when the engine and a UI write race for the
/// file lock.
pub fn open_database(path: &Path) -> StorageResult<Arc<Mutex<Connection>>> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Opens an in-memory database (for testing).
pub fn open_database_in_memory() -> StorageResult<Arc<Mutex<Connection>>> {
    let conn = Connection::open_in_memory()?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn ms_to_datetime(ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
