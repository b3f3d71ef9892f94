//! Local record store — domain records as JSON with indexed sync columns.
//!
//! Records of every kind share one `records` table: the payload is stored
//! as JSON, while the columns the sync engine and list views filter on
//! (kind, sync_status, deleted_at) stay relational. The columns are
//! authoritative — reads patch them back into the JSON so a caller never
//! sees a stale `sync_status` inside the payload.

use crate::error::{StorageError, StorageResult};
use crate::{ms_to_datetime, now_ms};
use bdpa_types::{EntityKind, SyncStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A record as stored on device.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub kind: EntityKind,
    pub data: serde_json::Value,
    pub sync_status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone; kept until remote deletion is confirmed.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Durable on-device store for domain records.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Opens or creates a record store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_database(path)?;
        Self::open_with_conn(conn)
    }

    /// Opens an in-memory record store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = crate::open_database_in_memory()?;
        Self::open_with_conn(conn)
    }

    /// Opens on an existing shared connection.
    pub fn open_with_conn(conn: Arc<Mutex<Connection>>) -> StorageResult<Self> {
        {
            let guard = conn.lock().unwrap();
            initialize_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// Saves (upserts) a record from a local write, marking it `local`.
    ///
    /// This is the write-through half of a mutation; the caller enqueues the
    /// matching queue item separately. `created_at` is preserved on upsert.
    pub fn save_local(
        &self,
        kind: EntityKind,
        id: &str,
        data: &serde_json::Value,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = now_ms();
        conn.execute(
            "INSERT INTO records (id, kind, data_json, sync_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'local', ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 data_json = excluded.data_json,
                 sync_status = 'local',
                 updated_at = excluded.updated_at",
            params![id, kind.to_string(), serde_json::to_string(data)?, now],
        )?;
        debug!(%kind, id, "record saved locally");
        Ok(())
    }

    /// Gets a record by id, or `None`.
    pub fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<StoredRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, kind, data_json, sync_status, last_sync, created_at, updated_at, deleted_at
             FROM records WHERE id = ?1 AND kind = ?2",
            params![id, kind.to_string()],
            row_to_record,
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Lists records of a kind, newest first. Tombstoned records are
    /// excluded unless `include_deleted` is set.
    pub fn list(&self, kind: EntityKind, include_deleted: bool) -> StorageResult<Vec<StoredRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, kind, data_json, sync_status, last_sync, created_at, updated_at, deleted_at
             FROM records WHERE kind = ?1",
        );
        if !include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![kind.to_string()], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Sets a record's sync status. The only status mutator — called by the
    /// sync engine and by nothing else after the initial local write.
    pub fn set_sync_status(
        &self,
        kind: EntityKind,
        id: &str,
        status: SyncStatus,
        last_sync: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE records SET sync_status = ?1, last_sync = ?2 WHERE id = ?3 AND kind = ?4",
            params![
                status.to_string(),
                last_sync.map(|t| t.timestamp_millis()),
                id,
                kind.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::RecordNotFound { kind: kind.to_string(), id: id.into() });
        }
        Ok(())
    }

    /// Soft-deletes a record: sets the tombstone and marks it `local` so the
    /// delete gets replayed remotely. The row stays until [`Self::remove`].
    pub fn tombstone(&self, kind: EntityKind, id: &str, when: DateTime<Utc>) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE records SET deleted_at = ?1, sync_status = 'local', updated_at = ?2
             WHERE id = ?3 AND kind = ?4",
            params![when.timestamp_millis(), now_ms(), id, kind.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::RecordNotFound { kind: kind.to_string(), id: id.into() });
        }
        debug!(%kind, id, "record tombstoned");
        Ok(())
    }

    /// Physically removes a record. Only valid once the remote store has
    /// confirmed the deletion — removing earlier would break idempotent
    /// replay of the delete.
    pub fn remove(&self, kind: EntityKind, id: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM records WHERE id = ?1 AND kind = ?2",
            params![id, kind.to_string()],
        )?;
        Ok(())
    }

    /// Merges object fields into a record's JSON payload (e.g. the public
    /// `foto_url` after an upload completes) without touching sync columns.
    pub fn merge_fields(
        &self,
        kind: EntityKind,
        id: &str,
        fields: &serde_json::Value,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT data_json FROM records WHERE id = ?1 AND kind = ?2",
                params![id, kind.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StorageError::RecordNotFound {
            kind: kind.to_string(),
            id: id.into(),
        })?;

        let mut data: serde_json::Value = serde_json::from_str(&raw)?;
        match (data.as_object_mut(), fields.as_object()) {
            (Some(target), Some(source)) => {
                for (key, value) in source {
                    target.insert(key.clone(), value.clone());
                }
            }
            _ => return Err(StorageError::CorruptRow(format!("record {id} is not an object"))),
        }

        conn.execute(
            "UPDATE records SET data_json = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
            params![serde_json::to_string(&data)?, now_ms(), id, kind.to_string()],
        )?;
        Ok(())
    }

    /// Counts non-tombstoned records of a kind.
    pub fn count(&self, kind: EntityKind) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = ?1 AND deleted_at IS NULL",
            params![kind.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    let id: String = row.get(0)?;
    let kind_raw: String = row.get(1)?;
    let data_json: String = row.get(2)?;
    let status_raw: String = row.get(3)?;
    let last_sync: Option<i64> = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let updated_at: i64 = row.get(6)?;
    let deleted_at: Option<i64> = row.get(7)?;

    let kind = EntityKind::parse(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown entity kind: {kind_raw}").into(),
        )
    })?;
    let sync_status = parse_status(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown sync status: {status_raw}").into(),
        )
    })?;

    let mut data: serde_json::Value = serde_json::from_str(&data_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    // The columns are authoritative for sync state; patch them back into
    // the payload so callers never read a stale embedded status.
    if let Some(obj) = data.as_object_mut() {
        obj.insert("sync_status".into(), serde_json::json!(sync_status));
        obj.insert(
            "deleted_at".into(),
            serde_json::json!(deleted_at.map(ms_to_datetime)),
        );
    }

    Ok(StoredRecord {
        id,
        kind,
        data,
        sync_status,
        last_sync: last_sync.map(ms_to_datetime),
        created_at: ms_to_datetime(created_at),
        updated_at: ms_to_datetime(updated_at),
        deleted_at: deleted_at.map(ms_to_datetime),
    })
}

fn parse_status(s: &str) -> Option<SyncStatus> {
    match s {
        "local" => Some(SyncStatus::Local),
        "syncing" => Some(SyncStatus::Syncing),
        "synced" => Some(SyncStatus::Synced),
        "conflict" => Some(SyncStatus::Conflict),
        "failed" => Some(SyncStatus::Failed),
        _ => None,
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL,
            data_json   TEXT NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'local',
            last_sync   INTEGER,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL,
            deleted_at  INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
        CREATE INDEX IF NOT EXISTS idx_records_status ON records(sync_status);
        CREATE INDEX IF NOT EXISTS idx_records_updated ON records(updated_at DESC);
        "#,
    )?;
    Ok(())
}
