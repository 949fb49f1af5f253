//! Reload completion notifications.

use tokio::sync::broadcast;

/// Event published after a reconciliation installs a new route set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEvent {
    ProxyReloaded,
}

/// Broadcasts [`ReloadEvent`]s to any number of observers.
///
/// Cloning shares the same channel. Emitting with nobody subscribed is fine.
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: broadcast::Sender<ReloadEvent>,
}

impl ReloadNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to reload events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Publish `ProxyReloaded`.
    pub fn proxy_reloaded(&self) {
        let _ = self.tx.send(ReloadEvent::ProxyReloaded);
    }

    /// Number of live observers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new()
    }
}
