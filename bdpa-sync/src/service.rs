//! Background sync service.
//!
//! Owns the drain triggers: the periodic auto-sync tick, the
//! offline→online reconnect edge, and manual requests sent through
//! [`SyncHandle`]. All triggers funnel into [`SyncEngine::drain`], whose
//! internal guard makes overlapping triggers harmless.

use crate::engine::{DrainOutcome, SyncEngine};
use crate::error::{SyncError, SyncResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Commands accepted by the service loop.
#[derive(Debug)]
pub enum SyncCommand {
    /// Run a drain pass now (subject to the engine's guards).
    TriggerDrain,
    /// Stop the service loop.
    Shutdown,
}

/// Cheap-to-clone handle for talking to a running sync service.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    /// Requests a drain pass. Returns once the request is queued, not once
    /// the drain finishes.
    pub async fn trigger_drain(&self) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::TriggerDrain)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

/// Spawns the service loop on the current runtime.
pub fn spawn_sync_service(engine: Arc<SyncEngine>) -> (SyncHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(16);
    let handle = SyncHandle { command_tx };
    let task = tokio::spawn(run_loop(engine, command_rx));
    (handle, task)
}

async fn run_loop(engine: Arc<SyncEngine>, mut command_rx: mpsc::Receiver<SyncCommand>) {
    let mut connectivity = engine.monitor().subscribe();
    let mut was_online = *connectivity.borrow();
    let auto_sync = engine.config().auto_sync;
    let mut tick = tokio::time::interval(engine.config().sync_interval);
    // Uninteresting first tick; also avoids burst catch-up after a long drain.
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tick.tick().await;

    info!(auto_sync, "sync service started");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                if auto_sync && engine.monitor().is_online() {
                    debug!("periodic drain tick");
                    drain(&engine).await;
                }
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *connectivity.borrow_and_update();
                // Only the offline→online edge triggers: going offline has
                // nothing to drain, and steady-state notifications were
                // already collapsed by the monitor.
                if online && !was_online {
                    info!("reconnected, draining queue");
                    drain(&engine).await;
                }
                was_online = online;
            }
            command = command_rx.recv() => {
                match command {
                    Some(SyncCommand::TriggerDrain) => drain(&engine).await,
                    Some(SyncCommand::Shutdown) | None => break,
                }
            }
        }
    }
    info!("sync service stopped");
}

async fn drain(engine: &SyncEngine) {
    match engine.drain().await {
        Ok(DrainOutcome::Skipped) => {}
        Ok(DrainOutcome::Finished(report)) => {
            debug!(?report, "drain pass finished");
        }
        Err(e) => {
            // Fatal to this pass only. The queue is durable; a later trigger
            // resumes from the persisted state.
            error!(error = %e, "drain failed");
        }
    }
}
