use tokio::sync::broadcast;
use tracing::debug;

use crate::models::User;

/// Capacity of the session event channel. Slow subscribers lag rather than
/// block the API client.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn(User),
    LoggedOut,
    /// The backend answered 401; the token has already been cleared.
    Expired,
}

/// Broadcast of session events shared by the API client and the session
/// controller. Clone is cheap, all clones feed the same channel.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        if self.tx.send(event).is_err() {
            debug!("Session event dropped, no subscribers");
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
