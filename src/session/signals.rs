//! Out-of-band session signals and user-facing notifications.
//!
//! Any collaborator (for example a request layer that just got a `401`) may
//! raise `SessionExpired`. The orchestrator is the single subscriber that acts
//! on it, and raising it while no session is authenticated is a no-op.

use tokio::sync::broadcast;
use tracing::{debug, warn};

const SIGNAL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    SessionExpired,
}

#[derive(Clone, Debug)]
pub struct SessionSignals {
    tx: broadcast::Sender<SessionSignal>,
}

impl Default for SessionSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignals {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget; nobody listening is not an error.
    pub fn raise_session_expired(&self) {
        if self.tx.send(SessionSignal::SessionExpired).is_err() {
            debug!("session-expired raised with no subscriber");
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.tx.subscribe()
    }
}

/// User-facing notice shown once per forced expiry.
pub trait NotificationPublisher: Send + Sync {
    fn show_session_expired(&self);
}

/// Publishes the expiry notice to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl NotificationPublisher for TracingNotifier {
    fn show_session_expired(&self) {
        warn!("Your session has expired, please sign in again");
    }
}
