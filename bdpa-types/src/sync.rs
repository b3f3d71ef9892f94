//! Sync queue data model, configuration, and observable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Per-record synchronization state.
///
/// Transitions happen only through the sync engine or the initiating local
/// write — read paths never set this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Created or modified locally, not yet pushed.
    Local,
    /// A drain pass is currently replaying this record's mutation.
    Syncing,
    /// Remote store confirmed the latest local mutation.
    Synced,
    /// Remote state diverged; needs operator resolution before retrying.
    Conflict,
    /// Retry budget exhausted; parked until manually retried.
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Local => "local",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Entity a queue item mutates. Photos queue independently of the record
/// they attach to, so a failed upload never blocks the record itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Avance,
    Medicion,
    Foto,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Avance => "avance",
            EntityKind::Medicion => "medicion",
            EntityKind::Foto => "foto",
        };
        f.write_str(s)
    }
}

impl EntityKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avance" => Some(EntityKind::Avance),
            "medicion" => Some(EntityKind::Medicion),
            "foto" => Some(EntityKind::Foto),
            _ => None,
        }
    }
}

/// Mutation to replay against the remote store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

impl Operation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }
}

/// Lifecycle state of a queue item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for the next drain pass.
    Pending,
    /// Currently being replayed against the remote store.
    Processing,
    /// Applied remotely; pruned at the end of the drain pass.
    Completed,
    /// Retry budget exhausted or remote conflict; kept until the user
    /// retries or removes it.
    Failed,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl ItemStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ItemStatus::Pending),
            "processing" => Some(ItemStatus::Processing),
            "completed" => Some(ItemStatus::Completed),
            "failed" => Some(ItemStatus::Failed),
            _ => None,
        }
    }
}

/// One pending remote mutation.
///
/// `payload` carries whatever the replay needs: the full record snapshot for
/// a create, the changed fields for an update, nothing beyond the target id
/// for a delete, and a photo descriptor (local path, bucket path, owning
/// record id) for a foto item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    /// Storage-assigned sequence; drains process items in ascending order.
    pub seq: i64,
    pub entity_kind: EntityKind,
    pub operation: Operation,
    /// The domain record this mutation applies to.
    pub target_id: String,
    pub payload: serde_json::Value,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub status: ItemStatus,
    pub enqueued_at: DateTime<Utc>,
}

/// Sync engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Transport failures beyond this count park the item as failed.
    pub max_retries: u32,
    /// Periodic auto-drain interval while online.
    pub sync_interval: Duration,
    /// Whether the periodic auto-drain runs at all.
    pub auto_sync: bool,
    /// Photo recompression hint (0–9) carried to the capture path; the sync
    /// core itself treats photo bytes as opaque.
    pub compression_level: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            sync_interval: Duration::from_secs(30),
            auto_sync: true,
            compression_level: 6,
        }
    }
}

/// Observable sync state reported to the UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub is_online: bool,
    pub is_syncing: bool,
    pub queue_length: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// A user-visible error entry from a drain pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub item_id: Uuid,
    pub entity_kind: EntityKind,
    pub target_id: String,
    pub message: String,
    pub is_conflict: bool,
    pub occurred_at: DateTime<Utc>,
}
