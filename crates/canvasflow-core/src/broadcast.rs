//! Fan-out channel for session update events.
//!
//! Delivery is best-effort: events are dropped when no observer is connected
//! or when a receiver lags, and a send never blocks the producing stream.

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::SessionUpdate;

const BUFFER_CAPACITY: usize = 256;

/// Broadcast sender for session updates.
///
/// Observers subscribe for all sessions and route by the event's embedded
/// session and canvas ids. Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct SessionBroadcaster {
    tx: broadcast::Sender<SessionUpdate>,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUFFER_CAPACITY);
        Self { tx }
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.tx.subscribe()
    }

    /// Publish an update to all current observers.
    pub fn send(&self, update: SessionUpdate) {
        trace!(
            session_id = %update.session_id,
            receivers = self.tx.receiver_count(),
            "Broadcasting session update"
        );
        let _ = self.tx.send(update);
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
