//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from the local record store and sync queue.
///
/// These are fatal to the triggering operation and propagate to the caller;
/// the sync engine never retries a broken local store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record not found: {kind} {id}")]
    RecordNotFound { kind: String, id: String },

    #[error("queue item not found: {0}")]
    ItemNotFound(uuid::Uuid),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
