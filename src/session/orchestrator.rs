//! Session orchestrator: the only code that moves the session between states.
//!
//! Flow Overview:
//! 1) `initialize` hydrates once from the persistent store and marks the
//!    initial check complete.
//! 2) `login` calls the backend and lands in `TwoFactorPending` or
//!    `Authenticated` (persisted, monitor armed); failures land in `Anonymous`.
//! 3) `verify_two_factor` upgrades a pending challenge; failures keep it pending.
//! 4) `logout` and forced expiry (monitor tick or `SessionExpired` signal)
//!    clear the store, disarm the monitor and end in `Anonymous`.
//!
//! Duplicate `login`/`verify_two_factor` calls while one of the same kind is
//! outstanding return `Ok(None)` without touching the backend.
//!
//! Every transition runs under one lock, so the persisted token, the armed
//! monitor and the stored session always describe the same state.

use crate::backend::{AuthBackend, AuthGrant, Credentials, LoginResponse};
use crate::session::{
    errors::{LoginError, StoreError, TwoFactorError},
    monitor::TokenExpiryMonitor,
    permissions::{self, RouteAccess},
    persist::PersistentTokenStore,
    signals::{NotificationPublisher, SessionSignal, SessionSignals, TracingNotifier},
    store::{SessionSnapshot, SessionStore},
    token::{Clock, JwtExpiryDecoder, SystemClock, TokenDecoder},
    types::{AuthenticatedSession, Session, SessionKind, TwoFactorChallenge, User},
    SessionSettings,
};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use time::OffsetDateTime;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn AuthBackend>,
    pub tokens: Arc<dyn PersistentTokenStore>,
    pub decoder: Arc<dyn TokenDecoder>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn NotificationPublisher>,
}

impl Collaborators {
    /// JWT decoding, the system clock and log notifications.
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, tokens: Arc<dyn PersistentTokenStore>) -> Self {
        Self {
            backend,
            tokens,
            decoder: Arc::new(JwtExpiryDecoder),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
        }
    }
}

/// What triggered a forced expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirySource {
    Monitor,
    Signal,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<SessionStore>,
    signals: SessionSignals,
    settings: SessionSettings,
    backend: Arc<dyn AuthBackend>,
    tokens: Arc<dyn PersistentTokenStore>,
    decoder: Arc<dyn TokenDecoder>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationPublisher>,
    monitor: TokenExpiryMonitor,
    transition: Mutex<()>,
    login_in_flight: AtomicBool,
    verify_in_flight: AtomicBool,
    initialized: AtomicBool,
    listener: JoinHandle<()>,
}

/// Why a granted token could not become a session.
enum GrantRejected {
    Expired,
    Storage(StoreError),
}

impl From<GrantRejected> for LoginError {
    fn from(rejected: GrantRejected) -> Self {
        match rejected {
            GrantRejected::Expired => Self::TokenRejected,
            GrantRejected::Storage(err) => Self::Storage(err),
        }
    }
}

impl From<GrantRejected> for TwoFactorError {
    fn from(rejected: GrantRejected) -> Self {
        match rejected {
            GrantRejected::Expired => Self::TokenRejected,
            GrantRejected::Storage(err) => Self::Storage(err),
        }
    }
}

/// Holds an in-flight flag for the lifetime of one operation.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SessionOrchestrator {
    /// Subscribes to `signals` and wires the expiry monitor back into this
    /// orchestrator. Neither holds a strong reference, so dropping the last
    /// handle tears both down.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        signals: SessionSignals,
        collaborators: Collaborators,
        settings: SessionSettings,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let on_expired = {
                let weak = weak.clone();
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.expire(ExpirySource::Monitor);
                    }
                })
            };
            let monitor = TokenExpiryMonitor::new(
                settings.expiry_check_interval,
                Arc::clone(&collaborators.clock),
                Arc::clone(&collaborators.decoder),
                on_expired,
            );
            let listener = tokio::spawn(listen_for_signals(weak.clone(), signals.subscribe()));

            Inner {
                store,
                signals,
                settings,
                backend: collaborators.backend,
                tokens: collaborators.tokens,
                decoder: collaborators.decoder,
                clock: collaborators.clock,
                notifier: collaborators.notifier,
                monitor,
                transition: Mutex::new(()),
                login_in_flight: AtomicBool::new(false),
                verify_in_flight: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                listener,
            }
        });
        Self { inner }
    }

    /// Startup hydration. Runs once per orchestrator; later calls return false.
    /// Storage problems are logged and fall back to `Anonymous`.
    pub fn initialize(&self) -> bool {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            debug!("session already hydrated");
            return false;
        }
        self.inner.hydrate();
        self.inner.store.mark_initial_check_complete();
        true
    }

    /// Returns the resulting session kind, or `None` when another login was
    /// already in flight and this call did nothing.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the credentials or the granted
    /// session cannot be established. The session is `Anonymous` afterwards.
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<SessionKind>, LoginError> {
        let Some(_guard) = InFlightGuard::acquire(&self.inner.login_in_flight) else {
            debug!("login already in flight, ignoring duplicate");
            return Ok(None);
        };

        let response = match self.inner.backend.login(credentials).await {
            Ok(response) => response,
            Err(err) => {
                warn!(username = %credentials.username, "login failed: {err}");
                self.inner.reset_to_anonymous();
                return Err(err.into());
            }
        };

        match response {
            LoginResponse::Authenticated(grant) => {
                if let Err(rejected) = self.inner.establish(grant) {
                    self.inner.reset_to_anonymous();
                    return Err(rejected.into());
                }
                Ok(Some(SessionKind::Authenticated))
            }
            LoginResponse::TwoFactorRequired(challenge) => {
                if challenge.temp_token.expose_secret().is_empty() {
                    self.inner.reset_to_anonymous();
                    return Err(LoginError::MissingTempToken);
                }
                info!(
                    username = %credentials.username,
                    is_new_setup = challenge.is_new_setup,
                    setup_reason = %challenge.setup_reason,
                    "two-factor verification required"
                );
                self.inner.enter_two_factor(challenge);
                Ok(Some(SessionKind::TwoFactorPending))
            }
        }
    }

    /// Returns `None` when another verification was already in flight.
    ///
    /// # Errors
    /// Returns `NotPending` outside `TwoFactorPending`. Backend failures leave
    /// the challenge in place so the caller can retry.
    pub async fn verify_two_factor(&self, code: &str) -> Result<Option<SessionKind>, TwoFactorError> {
        let Some(temp_token) = self.pending_temp_token() else {
            return Err(TwoFactorError::NotPending);
        };
        let Some(_guard) = InFlightGuard::acquire(&self.inner.verify_in_flight) else {
            debug!("two-factor verification already in flight, ignoring duplicate");
            return Ok(None);
        };

        let grant = match self.inner.backend.verify_two_factor(&temp_token, code).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!("two-factor verification failed: {err}");
                return Err(err.into());
            }
        };

        self.inner.establish_if_pending(&temp_token, grant)?;
        Ok(Some(SessionKind::Authenticated))
    }

    /// Always ends in `Anonymous`. The remote call is best effort.
    pub async fn logout(&self) {
        let token = match self.inner.store.session() {
            Session::Authenticated(session) => Some(session.token),
            _ => None,
        };
        if let Some(token) = token.as_ref() {
            if let Err(err) = self.inner.backend.logout(Some(token)).await {
                error!("remote logout failed: {err}");
            }
        }
        self.inner.reset_to_anonymous();
        info!("signed out");
    }

    /// Force the session out of `Authenticated`. Returns false (and does
    /// nothing) in any other state.
    pub fn expire_session(&self, source: ExpirySource) -> bool {
        self.inner.expire(source)
    }

    /// Run the expiry check now instead of waiting for the next tick.
    pub fn check_expiry_now(&self) -> bool {
        self.inner.monitor.check_now()
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        permissions::has_permission(&self.inner.store.session(), permission)
    }

    #[must_use]
    pub fn has_role(&self, role_name: &str) -> bool {
        permissions::has_role(&self.inner.store.session(), role_name)
    }

    #[must_use]
    pub fn route_access(&self, path: &str) -> RouteAccess {
        permissions::route_access(&self.inner.store.session(), path)
    }

    #[must_use]
    pub fn session_expires_at(&self) -> Option<OffsetDateTime> {
        self.inner.store.session().expires_at()
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.store.session()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.store.get()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.store.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn signals(&self) -> &SessionSignals {
        &self.inner.signals
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn is_monitor_armed(&self) -> bool {
        self.inner.monitor.is_armed()
    }

    /// Cancel the expiry timer and stop listening for signals.
    pub fn shutdown(&self) {
        self.inner.monitor.disarm();
        self.inner.listener.abort();
        debug!("session orchestrator shut down");
    }

    fn pending_temp_token(&self) -> Option<SecretString> {
        self.inner
            .store
            .session()
            .challenge()
            .map(|challenge| challenge.temp_token.clone())
    }
}

impl Inner {
    fn hydrate(&self) {
        let _transition = self.transition.lock();
        let stored = match self.tokens.read() {
            Ok(stored) => stored,
            Err(err) => {
                warn!("session hydration failed, starting signed out: {err}");
                None
            }
        };

        match stored.and_then(|stored| self.authenticated_session(stored.token, stored.user)) {
            Some(session) => {
                info!(
                    user = %session.user.username,
                    expires_at = %session.expires_at,
                    "restored session"
                );
                self.monitor.arm(session.token.clone());
                self.store.set(Session::Authenticated(session));
            }
            None => {
                debug!("no valid stored session");
                self.clear_tokens();
                self.store.set(Session::Anonymous);
            }
        }
    }

    /// `None` when the token is undecodable or already expired.
    fn authenticated_session(&self, token: SecretString, user: User) -> Option<AuthenticatedSession> {
        let expires_at = self.decoder.decode_expiry(token.expose_secret())?;
        (expires_at > self.clock.now()).then_some(AuthenticatedSession {
            user,
            token,
            expires_at,
        })
    }

    fn establish(&self, grant: AuthGrant) -> Result<(), GrantRejected> {
        let _transition = self.transition.lock();
        self.establish_locked(grant)
    }

    /// Upgrades the challenge identified by `temp_token`. A grant that arrives
    /// after the session moved on is discarded.
    fn establish_if_pending(
        &self,
        temp_token: &SecretString,
        grant: AuthGrant,
    ) -> Result<(), TwoFactorError> {
        let _transition = self.transition.lock();
        let still_pending = self.store.session().challenge().is_some_and(|current| {
            current.temp_token.expose_secret() == temp_token.expose_secret()
        });
        if !still_pending {
            debug!("session changed during two-factor verification, discarding grant");
            return Err(TwoFactorError::Superseded);
        }

        self.establish_locked(grant).map_err(|rejected| {
            self.clear_tokens();
            rejected.into()
        })
    }

    fn establish_locked(&self, grant: AuthGrant) -> Result<(), GrantRejected> {
        let AuthGrant { token, user } = grant;
        let Some(session) = self.authenticated_session(token, user) else {
            warn!("granted token is expired or undecodable");
            return Err(GrantRejected::Expired);
        };
        self.tokens
            .write(&session.token, &session.user)
            .map_err(|err| {
                error!("failed to persist session: {err}");
                GrantRejected::Storage(err)
            })?;

        self.monitor.arm(session.token.clone());
        info!(
            user = %session.user.username,
            expires_at = %session.expires_at,
            "session authenticated"
        );
        self.store.set(Session::Authenticated(session));
        Ok(())
    }

    fn enter_two_factor(&self, challenge: TwoFactorChallenge) {
        let _transition = self.transition.lock();
        self.monitor.disarm();
        self.clear_tokens();
        self.store.set(Session::TwoFactorPending(challenge));
    }

    fn reset_to_anonymous(&self) {
        let _transition = self.transition.lock();
        self.monitor.disarm();
        self.clear_tokens();
        self.store.set(Session::Anonymous);
    }

    fn clear_tokens(&self) {
        if let Err(err) = self.tokens.clear() {
            error!("failed to clear stored session: {err}");
        }
    }

    fn expire(&self, source: ExpirySource) -> bool {
        let _transition = self.transition.lock();
        if !self
            .store
            .replace_if(Session::is_authenticated, Session::Expired)
        {
            debug!(?source, "expiry ignored, no authenticated session");
            return false;
        }

        warn!(?source, "session expired");
        self.monitor.disarm();
        self.clear_tokens();
        self.notifier.show_session_expired();
        self.store.set(Session::Anonymous);
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen_for_signals(inner: Weak<Inner>, mut signals: broadcast::Receiver<SessionSignal>) {
    loop {
        match signals.recv().await {
            Ok(SessionSignal::SessionExpired) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "session signal receiver lagged");
            }
            Err(RecvError::Closed) => break,
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.expire(ExpirySource::Signal);
    }
}
