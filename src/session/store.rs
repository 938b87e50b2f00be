//! Single holder of the current session. No business logic lives here; the
//! orchestrator decides transitions and this store publishes them to
//! subscribers (UI, redirect driver) through a `watch` channel.

use crate::session::types::{Session, SessionKind};
use tokio::sync::watch;
use tracing::debug;

/// What subscribers observe: the session plus whether startup hydration has
/// finished. Redirects must not be evaluated while `initial_check_complete`
/// is false.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub session: Session,
    pub initial_check_complete: bool,
}

#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    #[must_use]
    pub fn get(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.tx.borrow().session.clone()
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.tx.borrow().session.kind()
    }

    #[must_use]
    pub fn initial_check_complete(&self) -> bool {
        self.tx.borrow().initial_check_complete
    }

    pub fn set(&self, session: Session) {
        self.tx.send_modify(|snapshot| {
            debug!(
                from = %snapshot.session.kind(),
                to = %session.kind(),
                "session transition"
            );
            snapshot.session = session;
        });
    }

    /// Replace the session only when `predicate` accepts the current one.
    /// Check and swap happen under the channel lock, so concurrent callers
    /// cannot both win.
    pub fn replace_if<F>(&self, predicate: F, session: Session) -> bool
    where
        F: FnOnce(&Session) -> bool,
    {
        let mut next = Some(session);
        self.tx.send_if_modified(|snapshot| {
            if !predicate(&snapshot.session) {
                return false;
            }
            if let Some(session) = next.take() {
                debug!(
                    from = %snapshot.session.kind(),
                    to = %session.kind(),
                    "session transition"
                );
                snapshot.session = session;
            }
            true
        })
    }

    /// Flip `initial_check_complete` to true. Returns false if it already was.
    pub fn mark_initial_check_complete(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.initial_check_complete {
                return false;
            }
            snapshot.initial_check_complete = true;
            true
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }
}
