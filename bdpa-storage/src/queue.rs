//! Sync queue — durable FIFO list of pending remote mutations.
//!
//! Items are ordered by a storage-assigned sequence so drains replay
//! mutations in enqueue order, per record and globally. `pending_items`
//! returns a snapshot and never mutates status; the engine transitions
//! items through [`QueueItemUpdate`].

use crate::error::{StorageError, StorageResult};
use crate::{ms_to_datetime, now_ms};
use bdpa_types::{EntityKind, ItemStatus, Operation, QueueItem};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// Partial update applied to a queue item during a drain pass.
#[derive(Clone, Debug, Default)]
pub struct QueueItemUpdate {
    pub status: Option<ItemStatus>,
    pub attempt_count: Option<u32>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueueItemUpdate {
    pub fn status(status: ItemStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }
}

/// Durable, ordered queue of pending remote mutations.
#[derive(Clone)]
pub struct SyncQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SyncQueue {
    /// Opens or creates a queue at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_database(path)?;
        Self::open_with_conn(conn)
    }

    /// Opens an in-memory queue (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = crate::open_database_in_memory()?;
        Self::open_with_conn(conn)
    }

    /// Opens on an existing shared connection.
    ///
    /// Items left `processing` by a drain the process never finished are
    /// recovered to `pending` here; otherwise they would be invisible to
    /// every later drain.
    pub fn open_with_conn(conn: Arc<Mutex<Connection>>) -> StorageResult<Self> {
        {
            let guard = conn.lock().unwrap();
            initialize_schema(&guard)?;
            let recovered = guard.execute(
                "UPDATE sync_queue SET status = 'pending' WHERE status = 'processing'",
                [],
            )?;
            if recovered > 0 {
                info!(recovered, "in-flight queue items recovered to pending");
            }
        }
        Ok(Self { conn })
    }

    /// Appends a new pending item and returns its id.
    pub fn enqueue(
        &self,
        entity_kind: EntityKind,
        operation: Operation,
        target_id: &str,
        payload: serde_json::Value,
    ) -> StorageResult<Uuid> {
        let id = Uuid::new_v4();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_queue
                 (id, entity_kind, operation, target_id, payload_json,
                  attempt_count, status, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending', ?6)",
            params![
                id.to_string(),
                entity_kind.to_string(),
                operation.to_string(),
                target_id,
                serde_json::to_string(&payload)?,
                now_ms(),
            ],
        )?;
        debug!(%entity_kind, %operation, target_id, item = %id, "mutation enqueued");
        Ok(id)
    }

    /// Returns all `pending` items in FIFO order without mutating them.
    ///
    /// This is the drain snapshot: items enqueued after the call are not
    /// part of the current pass.
    pub fn pending_items(&self) -> StorageResult<Vec<QueueItem>> {
        self.items_with_status(ItemStatus::Pending)
    }

    /// Returns all `failed` (parked) items in FIFO order.
    pub fn failed_items(&self) -> StorageResult<Vec<QueueItem>> {
        self.items_with_status(ItemStatus::Failed)
    }

    fn items_with_status(&self, status: ItemStatus) -> StorageResult<Vec<QueueItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT seq, id, entity_kind, operation, target_id, payload_json,
                    attempt_count, last_attempt_at, last_error, status, enqueued_at
             FROM sync_queue WHERE status = ?1 ORDER BY seq ASC",
        )?;
        let items = stmt
            .query_map(params![status.to_string()], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Gets a single item by id.
    pub fn get(&self, id: Uuid) -> StorageResult<Option<QueueItem>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT seq, id, entity_kind, operation, target_id, payload_json,
                    attempt_count, last_attempt_at, last_error, status, enqueued_at
             FROM sync_queue WHERE id = ?1",
            params![id.to_string()],
            row_to_item,
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Applies a partial update to an item.
    pub fn update_item(&self, id: Uuid, update: QueueItemUpdate) -> StorageResult<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(Box::new(status.to_string()));
        }
        if let Some(count) = update.attempt_count {
            sets.push("attempt_count = ?");
            values.push(Box::new(count));
        }
        if let Some(at) = update.last_attempt_at {
            sets.push("last_attempt_at = ?");
            values.push(Box::new(at.timestamp_millis()));
        }
        if let Some(err) = update.last_error {
            sets.push("last_error = ?");
            values.push(Box::new(err));
        }
        if sets.is_empty() {
            return Ok(());
        }

        let sql = format!("UPDATE sync_queue SET {} WHERE id = ?", sets.join(", "));
        values.push(Box::new(id.to_string()));

        let conn = self.conn.lock().unwrap();
        let changed =
            conn.execute(&sql, rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())))?;
        if changed == 0 {
            return Err(StorageError::ItemNotFound(id));
        }
        Ok(())
    }

    /// Removes an item regardless of status (completed pruning, manual
    /// queue management).
    pub fn remove(&self, id: Uuid) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    /// Prunes every completed item; returns how many were removed.
    pub fn remove_completed(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM sync_queue WHERE status = 'completed'", [])?;
        Ok(removed)
    }

    /// Manually re-arms a parked item: back to `pending` with a fresh retry
    /// budget. No-op error if the item is gone.
    pub fn retry_failed(&self, id: Uuid) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sync_queue
             SET status = 'pending', attempt_count = 0, last_error = NULL
             WHERE id = ?1 AND status = 'failed'",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::ItemNotFound(id));
        }
        debug!(item = %id, "failed item re-armed");
        Ok(())
    }

    /// Total number of items in the queue, any status.
    pub fn len(&self) -> StorageResult<usize> {
        self.count_where("1=1")
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn pending_count(&self) -> StorageResult<usize> {
        self.count_where("status = 'pending'")
    }

    pub fn failed_count(&self) -> StorageResult<usize> {
        self.count_where("status = 'failed'")
    }

    fn count_where(&self, clause: &str) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM sync_queue WHERE {clause}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    let seq: i64 = row.get(0)?;
    let id_raw: String = row.get(1)?;
    let kind_raw: String = row.get(2)?;
    let op_raw: String = row.get(3)?;
    let target_id: String = row.get(4)?;
    let payload_json: String = row.get(5)?;
    let attempt_count: u32 = row.get(6)?;
    let last_attempt_at: Option<i64> = row.get(7)?;
    let last_error: Option<String> = row.get(8)?;
    let status_raw: String = row.get(9)?;
    let enqueued_at: i64 = row.get(10)?;

    let parse_err = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };

    Ok(QueueItem {
        seq,
        id: Uuid::parse_str(&id_raw)
            .map_err(|e| parse_err(1, format!("bad item id {id_raw}: {e}")))?,
        entity_kind: EntityKind::parse(&kind_raw)
            .ok_or_else(|| parse_err(2, format!("unknown entity kind: {kind_raw}")))?,
        operation: Operation::parse(&op_raw)
            .ok_or_else(|| parse_err(3, format!("unknown operation: {op_raw}")))?,
        target_id,
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| parse_err(5, format!("bad payload json: {e}")))?,
        attempt_count,
        last_attempt_at: last_attempt_at.map(ms_to_datetime),
        last_error,
        status: ItemStatus::parse(&status_raw)
            .ok_or_else(|| parse_err(9, format!("unknown item status: {status_raw}")))?,
        enqueued_at: ms_to_datetime(enqueued_at),
    })
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sync_queue (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            entity_kind     TEXT NOT NULL,
            operation       TEXT NOT NULL,
            target_id       TEXT NOT NULL,
            payload_json    TEXT NOT NULL,
            attempt_count   INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            last_error      TEXT,
            status          TEXT NOT NULL DEFAULT 'pending',
            enqueued_at     INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_queue_status ON sync_queue(status, seq);
        CREATE INDEX IF NOT EXISTS idx_queue_target ON sync_queue(target_id);
        "#,
    )?;
    Ok(())
}
