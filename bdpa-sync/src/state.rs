//! Shared sync state: the drain guard, last-sync timestamp, and the
//! user-visible error list.

use bdpa_types::SyncErrorEntry;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Mutable state shared between the engine, the service loop, and the UI.
///
/// `is_syncing` is the sole concurrency guard: it is both the lock that
/// keeps two drains from running concurrently and the flag the UI shows.
#[derive(Default)]
pub struct SyncState {
    is_syncing: AtomicBool,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
    errors: Mutex<Vec<SyncErrorEntry>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims the drain lock. Returns false if a drain is
    /// already running.
    pub fn try_begin_sync(&self) -> bool {
        self.is_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the drain lock.
    pub fn end_sync(&self) {
        self.is_syncing.store(false, Ordering::Release);
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_at.lock().unwrap()
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) {
        *self.last_sync_at.lock().unwrap() = Some(at);
    }

    /// Appends a user-visible error entry.
    pub fn push_error(&self, entry: SyncErrorEntry) {
        self.errors.lock().unwrap().push(entry);
    }

    pub fn errors(&self) -> Vec<SyncErrorEntry> {
        self.errors.lock().unwrap().clone()
    }

    pub fn clear_errors(&self) {
        self.errors.lock().unwrap().clear();
    }
}
