//! Connectivity monitor — shared online/offline state.
//!
//! Two states, `online` and `offline`, mutated only through platform
//! adapters ([`ConnectivitySource`]) or test code. Consumers read the
//! current value or subscribe to transitions; the sync service treats
//! offline→online edges as an immediate drain trigger.

use tokio::sync::watch;
use tracing::info;

/// Platform adapter seam: an implementation forwards its environment's
/// online/offline events into the monitor via the registered callback.
pub trait ConnectivitySource {
    /// Registers the callback to invoke on every connectivity transition.
    /// The callback receives the new online state.
    fn subscribe(&mut self, callback: Box<dyn Fn(bool) + Send + Sync>);
}

/// Process-wide connectivity state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor initialized from the platform's current status.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    /// Current connectivity.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a transition. Repeated same-state events are collapsed so
    /// subscribers only wake on real edges.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    /// Subscribes to connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wires a platform adapter into this monitor.
    pub fn bind_source<S: ConnectivitySource>(&self, source: &mut S) {
        let monitor = self.clone();
        source.subscribe(Box::new(move |online| monitor.set_online(online)));
    }
}
