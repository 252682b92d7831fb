//! Online/offline state shared between the host and the dispatcher.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Binary connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Transport attempts allowed
    Online,
    /// Transport attempts suspended; events still enqueue
    Offline,
}

impl ConnectivityState {
    /// Map a boolean "is online" signal
    #[must_use]
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Tracks the state and broadcasts changes over a `watch` channel.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded from the runtime's current signal
    #[must_use]
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Whether transport attempts are allowed
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state() == ConnectivityState::Online
    }

    /// Apply a runtime signal. Returns `true` only on an actual transition.
    pub fn set(&self, state: ConnectivityState) -> bool {
        let previous = self.tx.send_replace(state);
        let changed = previous != state;
        if changed {
            tracing::info!(from = ?previous, to = ?state, "connectivity changed");
        }
        changed
    }

    /// Receiver that observes every subsequent transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changes_are_transitions() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Online);
        assert!(monitor.is_online());
        assert!(!monitor.set(ConnectivityState::Online));
        assert!(monitor.set(ConnectivityState::Offline));
        assert!(!monitor.is_online());
        assert!(!monitor.set(ConnectivityState::Offline));
        assert!(monitor.set(ConnectivityState::Online));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let mut rx = monitor.subscribe();

        monitor.set(ConnectivityState::Online);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectivityState::Online);
    }

    #[test]
    fn test_from_online_signal() {
        assert_eq!(ConnectivityState::from_online(true), ConnectivityState::Online);
        assert_eq!(ConnectivityState::from_online(false), ConnectivityState::Offline);
    }
}
