//! The abstract remote store the sync engine drains against.

use crate::error::RemoteResult;
use async_trait::async_trait;
use bdpa_types::EntityKind;

/// Operations the sync engine replays against the authoritative store.
///
/// Records are keyed by their client-generated id: the server echoes the id
/// back on create, so local ids are never rewritten. Implementations must be
/// idempotent for deletes — replaying a delete of an already-deleted record
/// is a success, which is what makes tombstoned replay safe.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates a record remotely and returns the remote id (confirmation).
    async fn create_record(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> RemoteResult<String>;

    /// Applies a partial update to an existing remote record.
    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        payload: &serde_json::Value,
    ) -> RemoteResult<()>;

    /// Deletes a remote record.
    async fn delete_record(&self, kind: EntityKind, id: &str) -> RemoteResult<()>;

    /// Uploads photo bytes to object storage, returning the public URL.
    async fn upload_photo(&self, bucket: &str, path: &str, bytes: &[u8]) -> RemoteResult<String>;
}
