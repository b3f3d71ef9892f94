//! Remote store error types.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from the remote authoritative store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Remote state diverged from the expected base version (HTTP 409).
    /// Retrying is futile without operator intervention, so the engine
    /// parks the item and marks the record `conflict` immediately.
    #[error("remote conflict on {entity} {id}: {detail}")]
    Conflict { entity: String, id: String, detail: String },

    /// Network unreachable, timeout, or a non-2xx response unrelated to a
    /// data conflict. Retried up to the configured budget.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered but the body wasn't what the protocol promises.
    #[error("unexpected API response: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteError {
    /// True for conflicts, which bypass the retry budget.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}
