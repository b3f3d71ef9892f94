//! Offline sync engine for BDPA.
//!
//! Field devices write records locally first and enqueue the matching remote
//! mutation; this crate drains that queue against the remote store whenever
//! connectivity allows:
//!
//! - [`ConnectivityMonitor`] — shared online/offline state, edge-triggered
//!   drain on reconnect
//! - [`SyncEngine`] — the drain pass: FIFO replay, retry budget, conflict
//!   parking, completed pruning; also the UI-facing mutation entry point
//! - [`spawn_sync_service`] — background loop tying drains to reconnect
//!   events, the periodic auto-sync tick, and manual triggers
//!
//! Everything runs on the cooperative tokio flow; the single `is_syncing`
//! flag is both the drain lock and the observable status.

mod connectivity;
mod engine;
mod error;
mod service;
mod state;

pub use connectivity::{ConnectivityMonitor, ConnectivitySource};
pub use engine::{DrainOutcome, DrainReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use service::{spawn_sync_service, SyncCommand, SyncHandle};
pub use state::SyncState;
