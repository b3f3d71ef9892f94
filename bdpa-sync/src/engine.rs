//! Sync engine — drains the queue against the remote store.
//!
//! One drain per trigger, never two concurrently. Within a pass, items
//! replay sequentially in enqueue order; one item's failure never aborts
//! the rest. A transport failure sends the item back to `pending` for the
//! *next* drain (no within-pass retry against a down endpoint); once the
//! retry budget is spent the item parks as `failed`. A remote conflict
//! parks the item immediately and marks the record `conflict` — retrying
//! without operator intervention is futile.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::state::SyncState;
use bdpa_cloud::{RemoteError, RemoteStore};
use bdpa_storage::{QueueItemUpdate, RecordStore, StorageError, SyncQueue};
use bdpa_types::{
    validate, EntityKind, ItemStatus, Operation, QueueItem, SyncConfig, SyncErrorEntry,
    SyncSnapshot, SyncStatus,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one drain trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Guard declined: already syncing, offline, or nothing pending.
    Skipped,
    /// A pass ran to completion (possibly abandoning items on mid-pass
    /// connectivity loss).
    Finished(DrainReport),
}

/// Per-pass item accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items the pass attempted.
    pub processed: usize,
    /// Applied remotely and pruned.
    pub completed: usize,
    /// Failed but still within the retry budget; pending again.
    pub retried: usize,
    /// Parked as failed (budget exhausted).
    pub parked: usize,
    /// Parked as failed due to a remote conflict.
    pub conflicts: usize,
    /// Left pending because connectivity dropped mid-pass.
    pub abandoned: usize,
}

/// The sync engine. Also carries the UI-facing mutation surface
/// (`enqueue_mutation`, `snapshot`, queue management), mirroring how the
/// write path and the drain share the same state containers.
pub struct SyncEngine {
    queue: SyncQueue,
    records: RecordStore,
    remote: Arc<dyn RemoteStore>,
    monitor: ConnectivityMonitor,
    state: Arc<SyncState>,
    config: SyncConfig,
    /// Object-storage bucket photo items upload into.
    photo_bucket: String,
}

impl SyncEngine {
    pub fn new(
        queue: SyncQueue,
        records: RecordStore,
        remote: Arc<dyn RemoteStore>,
        monitor: ConnectivityMonitor,
        config: SyncConfig,
        photo_bucket: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            records,
            remote,
            monitor,
            state: Arc::new(SyncState::new()),
            config,
            photo_bucket: photo_bucket.into(),
        }
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ── UI-facing write path ─────────────────────────────────────

    /// Validates, writes through to the local record store, and enqueues
    /// the remote mutation. Returns the queue item id.
    ///
    /// Validation failures never reach the queue; storage failures
    /// propagate to the caller immediately.
    pub fn enqueue_mutation(
        &self,
        kind: EntityKind,
        operation: Operation,
        target_id: &str,
        payload: Value,
    ) -> SyncResult<Uuid> {
        validate::validate_payload(kind, operation, &payload)?;

        match (kind, operation) {
            (EntityKind::Foto, _) => {
                // Photos have no local record of their own; the descriptor
                // rides in the queue item only.
            }
            (_, Operation::Create) => {
                self.records.save_local(kind, target_id, &payload)?;
            }
            (_, Operation::Update) => {
                self.records.merge_fields(kind, target_id, &payload)?;
                self.records.set_sync_status(kind, target_id, SyncStatus::Local, None)?;
            }
            (_, Operation::Delete) => {
                self.records.tombstone(kind, target_id, Utc::now())?;
            }
        }

        let item_id = self.queue.enqueue(kind, operation, target_id, payload)?;
        Ok(item_id)
    }

    /// Enqueues a photo upload for an avance. Queued as its own item so a
    /// failed upload never blocks the record's create/update, and vice versa.
    pub fn enqueue_foto(
        &self,
        avance_id: &str,
        local_path: &str,
        bucket_path: &str,
    ) -> SyncResult<Uuid> {
        let payload = serde_json::json!({
            "avance_id": avance_id,
            "local_path": local_path,
            "bucket_path": bucket_path,
            "compression_level": self.config.compression_level,
        });
        self.enqueue_mutation(EntityKind::Foto, Operation::Create, avance_id, payload)
    }

    /// Observable sync state for the UI.
    pub fn snapshot(&self) -> SyncResult<SyncSnapshot> {
        Ok(SyncSnapshot {
            is_online: self.monitor.is_online(),
            is_syncing: self.state.is_syncing(),
            queue_length: self.queue.len()?,
            pending_count: self.queue.pending_count()?,
            failed_count: self.queue.failed_count()?,
            last_sync_at: self.state.last_sync_at(),
        })
    }

    /// User-visible drain errors, newest last.
    pub fn errors(&self) -> Vec<SyncErrorEntry> {
        self.state.errors()
    }

    pub fn clear_errors(&self) {
        self.state.clear_errors();
    }

    /// Re-arms a parked item for the next drain.
    pub fn retry_item(&self, item_id: Uuid) -> SyncResult<()> {
        self.queue.retry_failed(item_id)?;
        Ok(())
    }

    /// Removes an item from the queue regardless of status.
    pub fn remove_item(&self, item_id: Uuid) -> SyncResult<()> {
        self.queue.remove(item_id)?;
        Ok(())
    }

    // ── Drain ────────────────────────────────────────────────────

    /// Runs one drain pass. A no-op (`Skipped`) when offline, when a drain
    /// is already running, or when nothing is pending.
    pub async fn drain(&self) -> SyncResult<DrainOutcome> {
        if !self.monitor.is_online() {
            return Ok(DrainOutcome::Skipped);
        }
        if !self.state.try_begin_sync() {
            debug!("drain skipped: already syncing");
            return Ok(DrainOutcome::Skipped);
        }

        let result = self.drain_locked().await;
        self.state.end_sync();
        result
    }

    async fn drain_locked(&self) -> SyncResult<DrainOutcome> {
        // Snapshot: items enqueued after this point wait for the next pass,
        // so a continuous stream of writes can't keep one drain alive forever.
        let snapshot = self.queue.pending_items()?;
        if snapshot.is_empty() {
            return Ok(DrainOutcome::Skipped);
        }

        info!(items = snapshot.len(), "drain started");
        let mut report = DrainReport::default();
        let total = snapshot.len();

        for (index, item) in snapshot.into_iter().enumerate() {
            // Connectivity dropped mid-pass: the in-flight item already
            // finished, the rest stay pending for the next reconnect.
            if !self.monitor.is_online() {
                report.abandoned = total - index;
                warn!(abandoned = report.abandoned, "connectivity lost mid-drain");
                break;
            }
            report.processed += 1;
            self.process_item(&item, &mut report).await?;
        }

        let pruned = self.queue.remove_completed()?;
        self.state.set_last_sync(Utc::now());
        info!(
            completed = report.completed,
            retried = report.retried,
            parked = report.parked,
            conflicts = report.conflicts,
            pruned,
            "drain finished"
        );
        Ok(DrainOutcome::Finished(report))
    }

    /// Replays one item. Remote failures are absorbed into queue/record
    /// state; only a local storage failure escapes (fatal to the drain).
    async fn process_item(&self, item: &QueueItem, report: &mut DrainReport) -> SyncResult<()> {
        let now = Utc::now();
        self.queue.update_item(
            item.id,
            QueueItemUpdate {
                status: Some(ItemStatus::Processing),
                last_attempt_at: Some(now),
                ..Default::default()
            },
        )?;
        self.set_record_status(item, SyncStatus::Syncing, None)?;

        match self.replay(item).await {
            Ok(foto_url) => {
                self.queue.update_item(item.id, QueueItemUpdate::status(ItemStatus::Completed))?;
                self.apply_success(item, foto_url)?;
                report.completed += 1;
                debug!(item = %item.id, kind = %item.entity_kind, op = %item.operation, "item synced");
            }
            Err(err) if err.is_conflict() => {
                // Conflicts bypass the retry budget entirely: the payload is
                // preserved in the parked item, never overwritten or dropped.
                self.queue.update_item(
                    item.id,
                    QueueItemUpdate {
                        status: Some(ItemStatus::Failed),
                        last_error: Some(err.to_string()),
                        ..Default::default()
                    },
                )?;
                self.set_record_status(item, SyncStatus::Conflict, None)?;
                self.push_error(item, &err, true);
                report.conflicts += 1;
                warn!(item = %item.id, target = item.target_id, "remote conflict, parked");
            }
            Err(err) => {
                let attempts = item.attempt_count + 1;
                if attempts >= self.config.max_retries {
                    self.queue.update_item(
                        item.id,
                        QueueItemUpdate {
                            status: Some(ItemStatus::Failed),
                            attempt_count: Some(attempts),
                            last_error: Some(err.to_string()),
                            ..Default::default()
                        },
                    )?;
                    self.set_record_status(item, SyncStatus::Failed, None)?;
                    self.push_error(item, &err, false);
                    report.parked += 1;
                    warn!(item = %item.id, attempts, "retry budget exhausted, parked");
                } else {
                    // Back to pending for the *next* drain trigger — never
                    // re-attempted within this pass.
                    self.queue.update_item(
                        item.id,
                        QueueItemUpdate {
                            status: Some(ItemStatus::Pending),
                            attempt_count: Some(attempts),
                            last_error: Some(err.to_string()),
                            ..Default::default()
                        },
                    )?;
                    self.set_record_status(item, SyncStatus::Local, None)?;
                    report.retried += 1;
                    debug!(item = %item.id, attempts, "transport failure, will retry next drain");
                }
            }
        }
        Ok(())
    }

    /// Invokes the remote operation for `(entity_kind, operation)`.
    /// Returns the public URL for photo uploads, `None` otherwise.
    async fn replay(&self, item: &QueueItem) -> Result<Option<String>, RemoteError> {
        match (item.entity_kind, item.operation) {
            (EntityKind::Foto, _) => {
                let local_path = payload_str(&item.payload, "local_path")?;
                let bucket_path = payload_str(&item.payload, "bucket_path")?;
                let bytes = tokio::fs::read(local_path).await.map_err(|e| {
                    RemoteError::Transport(format!("reading foto {local_path}: {e}"))
                })?;
                let url = self
                    .remote
                    .upload_photo(&self.photo_bucket, bucket_path, &bytes)
                    .await?;
                Ok(Some(url))
            }
            (kind, Operation::Create) => {
                self.remote.create_record(kind, &item.payload).await?;
                Ok(None)
            }
            (kind, Operation::Update) => {
                self.remote.update_record(kind, &item.target_id, &item.payload).await?;
                Ok(None)
            }
            (kind, Operation::Delete) => {
                self.remote.delete_record(kind, &item.target_id).await?;
                Ok(None)
            }
        }
    }

    /// Applies the local consequences of a confirmed remote mutation.
    fn apply_success(&self, item: &QueueItem, foto_url: Option<String>) -> SyncResult<()> {
        match (item.entity_kind, item.operation) {
            (EntityKind::Foto, _) => {
                // Store the public URL on the owning avance. The record may
                // legitimately be gone (deleted while the upload was queued).
                if let Some(url) = foto_url {
                    let patch = serde_json::json!({ "foto_url": url });
                    match self.records.merge_fields(EntityKind::Avance, &item.target_id, &patch) {
                        Ok(()) | Err(StorageError::RecordNotFound { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            (kind, Operation::Delete) => {
                // Remote confirmed: the tombstone has served its purpose.
                self.records.remove(kind, &item.target_id)?;
            }
            (kind, _) => {
                self.set_record_status_inner(kind, &item.target_id, SyncStatus::Synced, Some(Utc::now()))?;
            }
        }
        Ok(())
    }

    /// Sets the target record's status for avance/medición items. Photo
    /// items never drive the owning record's status — a failed upload must
    /// not mask a successfully synced record.
    fn set_record_status(&self, item: &QueueItem, status: SyncStatus, last_sync: Option<chrono::DateTime<Utc>>) -> SyncResult<()> {
        if item.entity_kind == EntityKind::Foto {
            return Ok(());
        }
        self.set_record_status_inner(item.entity_kind, &item.target_id, status, last_sync)
    }

    fn set_record_status_inner(
        &self,
        kind: EntityKind,
        id: &str,
        status: SyncStatus,
        last_sync: Option<chrono::DateTime<Utc>>,
    ) -> SyncResult<()> {
        match self.records.set_sync_status(kind, id, status, last_sync) {
            Ok(()) => Ok(()),
            // A delete replay can outlive its record (e.g. manual queue
            // removal raced a confirmed delete); not a drain-fatal state.
            Err(StorageError::RecordNotFound { .. }) => {
                debug!(%kind, id, "record gone, skipping status update");
                Ok(())
            }
            Err(e) => Err(SyncError::Storage(e)),
        }
    }

    fn push_error(&self, item: &QueueItem, err: &RemoteError, is_conflict: bool) {
        self.state.push_error(SyncErrorEntry {
            item_id: item.id,
            entity_kind: item.entity_kind,
            target_id: item.target_id.clone(),
            message: err.to_string(),
            is_conflict,
            occurred_at: Utc::now(),
        });
    }
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, RemoteError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::Api(format!("foto payload missing {field}")))
}
