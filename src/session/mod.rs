//! Session and authorization state machine.
//!
//! [`SessionStore`] holds the current [`Session`]; [`SessionOrchestrator`] is
//! the only thing that changes it. Everything else here is either a pure
//! function of the session (redirects, permissions) or a collaborator contract.

pub mod errors;
pub mod monitor;
pub mod orchestrator;
pub mod permissions;
pub mod persist;
pub mod redirect;
pub mod signals;
pub mod store;
pub mod token;
pub mod types;

pub use errors::{LoginError, StoreError, TwoFactorError};
pub use monitor::{TokenExpiryMonitor, DEFAULT_EXPIRY_CHECK_INTERVAL};
pub use orchestrator::{Collaborators, ExpirySource, SessionOrchestrator};
pub use persist::{FileTokenStore, MemoryTokenStore, PersistentTokenStore, StoredSession};
pub use redirect::{
    redirect_target, NavigateOptions, Navigator, Redirect, RedirectDriver, RedirectPolicy,
    RoutePaths,
};
pub use signals::{NotificationPublisher, SessionSignal, SessionSignals, TracingNotifier};
pub use store::{SessionSnapshot, SessionStore};
pub use token::{Clock, JwtExpiryDecoder, SystemClock, TokenDecoder};
pub use types::{
    AuthenticatedSession, Role, Session, SessionKind, TwoFactorChallenge, User, UserId,
};

use std::time::Duration;

/// Tunables for the session core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub expiry_check_interval: Duration,
    pub routes: RoutePaths,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_check_interval: DEFAULT_EXPIRY_CHECK_INTERVAL,
            routes: RoutePaths::default(),
        }
    }
}
