//! Durable cache storage, keyed by `(namespace, url)`.
//!
//! Namespaces carry the app version in their name; switching versions and
//! calling [`CacheStore::activate`] drops everything the new version does
//! not claim, which is the whole eviction story — no per-entry TTLs.

use crate::error::CacheResult;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A cached response body with its salient headers.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub stored_at: DateTime<Utc>,
}

/// Durable on-device cache.
#[derive(Clone)]
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl CacheStore {
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_conn(conn)
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_conn(Connection::open_in_memory()?)
    }

    fn with_conn(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace    TEXT NOT NULL,
                url          TEXT NOT NULL,
                body         BLOB NOT NULL,
                headers_json TEXT NOT NULL,
                stored_at    INTEGER NOT NULL,
                PRIMARY KEY (namespace, url)
            );
            "#,
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Stores (or replaces) an entry.
    pub fn put(
        &self,
        namespace: &str,
        url: &str,
        body: &[u8],
        headers: &[(String, String)],
    ) -> CacheResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (namespace, url, body, headers_json, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                namespace,
                url,
                body,
                serde_json::to_string(headers)?,
                Utc::now().timestamp_millis(),
            ],
        )?;
        debug!(namespace, url, bytes = body.len(), "cache entry stored");
        Ok(())
    }

    /// Looks up an entry in one namespace.
    pub fn get(&self, namespace: &str, url: &str) -> CacheResult<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT body, headers_json, stored_at FROM cache_entries
                 WHERE namespace = ?1 AND url = ?2",
                params![namespace, url],
                |row| {
                    let body: Vec<u8> = row.get(0)?;
                    let headers_json: String = row.get(1)?;
                    let stored_at: i64 = row.get(2)?;
                    Ok((body, headers_json, stored_at))
                },
            )
            .optional()?;

        match row {
            Some((body, headers_json, stored_at)) => Ok(Some(CacheEntry {
                body,
                headers: serde_json::from_str(&headers_json)?,
                stored_at: Utc.timestamp_millis_opt(stored_at).single().unwrap_or_default(),
            })),
            None => Ok(None),
        }
    }

    pub fn remove(&self, namespace: &str, url: &str) -> CacheResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE namespace = ?1 AND url = ?2",
            params![namespace, url],
        )?;
        Ok(())
    }

    /// Drops every namespace not in `keep`. Called on version activation;
    /// returns how many entries were evicted.
    pub fn activate(&self, keep: &[&str]) -> CacheResult<usize> {
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; keep.len()].join(", ");
        let sql =
            format!("DELETE FROM cache_entries WHERE namespace NOT IN ({placeholders})");
        let evicted = conn.execute(&sql, rusqlite::params_from_iter(keep.iter()))?;
        if evicted > 0 {
            info!(evicted, "stale cache namespaces dropped");
        }
        Ok(evicted)
    }

    /// Distinct namespaces currently present.
    pub fn namespaces(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT DISTINCT namespace FROM cache_entries ORDER BY namespace")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Wipes the whole cache.
    pub fn clear(&self) -> CacheResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    pub fn len(&self) -> CacheResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}
