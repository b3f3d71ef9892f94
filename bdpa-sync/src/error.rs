//! Sync engine error types.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync engine and service.
///
/// Remote failures are *not* here: the engine absorbs them per item
/// (retry, park, or conflict) and reports them through the error list.
/// What does escape is anything fatal to the triggering operation itself.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local persistence failed. Never retried — replaying against a broken
    /// store risks corrupting queue state.
    #[error("storage error: {0}")]
    Storage(#[from] bdpa_storage::StorageError),

    /// Payload rejected before enqueue.
    #[error("validation error: {0}")]
    Validation(#[from] bdpa_types::ValidationError),

    /// The sync service is not running.
    #[error("sync service channel closed")]
    ChannelClosed,
}
