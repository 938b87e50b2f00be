//! Redirect policy: the single place that decides where the console should be
//! for a given session and location.
//!
//! Flow Overview:
//! - `Authenticated` on the login or two-factor page goes to the app root.
//! - `TwoFactorPending` anywhere but the two-factor page goes there.
//! - `Anonymous` anywhere but the login page goes to the login page.
//! - Everything else stays put.
//!
//! The pure mapping is [`redirect_target`]. [`RedirectPolicy`] adds the
//! once-per-snapshot guard and [`RedirectDriver`] is its only side-effecting
//! consumer.

use crate::session::{
    store::SessionSnapshot,
    types::{Session, SessionKind},
};
use tokio::sync::watch;
use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/";
pub const TWO_FACTOR_PATH: &str = "/verify-2fa";
pub const APP_ROOT_PATH: &str = "/dashboard";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePaths {
    pub login: String,
    pub two_factor: String,
    pub app_root: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            login: LOGIN_PATH.to_string(),
            two_factor: TWO_FACTOR_PATH.to_string(),
            app_root: APP_ROOT_PATH.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    pub replace: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub options: NavigateOptions,
}

/// The external router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str, options: NavigateOptions);
}

/// Pure mapping from `(session, path)` to the one correct location.
#[must_use]
pub fn redirect_target<'a>(session: &Session, path: &str, routes: &'a RoutePaths) -> Option<&'a str> {
    match session {
        Session::Authenticated(_) => {
            (path == routes.login || path == routes.two_factor).then_some(routes.app_root.as_str())
        }
        Session::TwoFactorPending(_) => {
            (path != routes.two_factor).then_some(routes.two_factor.as_str())
        }
        Session::Anonymous | Session::Expired => {
            (path != routes.login).then_some(routes.login.as_str())
        }
    }
}

/// Wraps [`redirect_target`] with a guard so identical inputs never produce a
/// second navigation. The guard resets as soon as the session variant or the
/// path changes. `Expired` and `Anonymous` share a guard slot.
#[derive(Debug)]
pub struct RedirectPolicy {
    routes: RoutePaths,
    last: Option<(SessionKind, String)>,
}

impl RedirectPolicy {
    #[must_use]
    pub fn new(routes: RoutePaths) -> Self {
        Self { routes, last: None }
    }

    #[must_use]
    pub fn routes(&self) -> &RoutePaths {
        &self.routes
    }

    /// Returns `None` until hydration has completed.
    pub fn evaluate(&mut self, snapshot: &SessionSnapshot, path: &str) -> Option<Redirect> {
        if !snapshot.initial_check_complete {
            return None;
        }

        // Expiry flips the store to Anonymous right away; both route the same.
        let kind = match snapshot.session.kind() {
            SessionKind::Expired => SessionKind::Anonymous,
            kind => kind,
        };
        let key = (kind, path.to_string());
        if self.last.as_ref() == Some(&key) {
            return None;
        }
        self.last = Some(key);

        redirect_target(&snapshot.session, path, &self.routes).map(|to| Redirect {
            to: to.to_string(),
            options: NavigateOptions { replace: true },
        })
    }
}

/// Feeds session-store notifications and location changes through a
/// [`RedirectPolicy`] and hands the result to the router.
pub struct RedirectDriver<N> {
    policy: RedirectPolicy,
    navigator: N,
}

impl<N: Navigator> RedirectDriver<N> {
    #[must_use]
    pub fn new(routes: RoutePaths, navigator: N) -> Self {
        Self {
            policy: RedirectPolicy::new(routes),
            navigator,
        }
    }

    /// Evaluate one `(snapshot, path)` pair and navigate if needed.
    pub fn on_change(&mut self, snapshot: &SessionSnapshot, path: &str) -> Option<Redirect> {
        let redirect = self.policy.evaluate(snapshot, path)?;
        info!(from = path, to = %redirect.to, session = %snapshot.session.kind(), "redirecting");
        self.navigator.navigate(&redirect.to, redirect.options);
        Some(redirect)
    }

    /// Run until either channel closes.
    pub async fn run(
        mut self,
        mut sessions: watch::Receiver<SessionSnapshot>,
        mut location: watch::Receiver<String>,
    ) {
        loop {
            let snapshot = sessions.borrow_and_update().clone();
            let path = location.borrow_and_update().clone();
            self.on_change(&snapshot, &path);

            tokio::select! {
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = location.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("redirect driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{AuthenticatedSession, TwoFactorChallenge, User, UserId};
    use parking_lot::Mutex;
    use secrecy::SecretString;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn authenticated() -> Session {
        Session::Authenticated(AuthenticatedSession {
            user: User {
                id: UserId::from(1),
                username: "admin".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role: None,
            },
            token: SecretString::from("tok"),
            expires_at: OffsetDateTime::UNIX_EPOCH,
        })
    }

    fn pending(temp_token: &str) -> Session {
        Session::TwoFactorPending(TwoFactorChallenge {
            temp_token: SecretString::from(temp_token),
            user_id: None,
            message: None,
            qr_code_url: None,
            manual_entry_key: None,
            is_new_setup: false,
            setup_reason: "STANDARD".to_string(),
            requires_new_configuration: false,
        })
    }

    fn ready(session: Session) -> SessionSnapshot {
        SessionSnapshot {
            session,
            initial_check_complete: true,
        }
    }

    #[test]
    fn redirect_table() {
        let routes = RoutePaths::default();
        assert_eq!(redirect_target(&authenticated(), "/", &routes), Some("/dashboard"));
        assert_eq!(
            redirect_target(&authenticated(), "/verify-2fa", &routes),
            Some("/dashboard")
        );
        assert_eq!(redirect_target(&authenticated(), "/dashboard", &routes), None);
        assert_eq!(redirect_target(&Session::Anonymous, "/dashboard", &routes), Some("/"));
        assert_eq!(redirect_target(&Session::Anonymous, "/", &routes), None);
        assert_eq!(redirect_target(&pending("abc"), "/login", &routes), Some("/verify-2fa"));
        assert_eq!(redirect_target(&pending("abc"), "/verify-2fa", &routes), None);
    }

    #[test]
    fn nothing_is_evaluated_before_hydration() {
        let mut policy = RedirectPolicy::new(RoutePaths::default());
        let snapshot = SessionSnapshot::default();
        assert_eq!(policy.evaluate(&snapshot, "/dashboard"), None);
        // Once hydrated the same pair is evaluated for real.
        assert_eq!(
            policy
                .evaluate(&ready(Session::Anonymous), "/dashboard")
                .map(|r| r.to),
            Some("/".to_string())
        );
    }

    #[test]
    fn identical_snapshot_redirects_once() {
        let mut policy = RedirectPolicy::new(RoutePaths::default());
        let snapshot = ready(Session::Anonymous);
        let first = policy.evaluate(&snapshot, "/students");
        assert_eq!(
            first,
            Some(Redirect {
                to: "/".to_string(),
                options: NavigateOptions { replace: true },
            })
        );
        assert_eq!(policy.evaluate(&snapshot, "/students"), None);
    }

    #[test]
    fn guard_resets_when_variant_or_path_changes() {
        let mut policy = RedirectPolicy::new(RoutePaths::default());
        assert!(policy.evaluate(&ready(Session::Anonymous), "/students").is_some());
        // Path changed: a later legitimate redirect is not suppressed.
        assert!(policy.evaluate(&ready(Session::Anonymous), "/payments").is_some());
        assert!(policy.evaluate(&ready(authenticated()), "/payments").is_none());
        assert!(policy.evaluate(&ready(Session::Anonymous), "/payments").is_some());
    }

    #[test]
    fn expiry_followed_by_anonymous_redirects_once() {
        let mut policy = RedirectPolicy::new(RoutePaths::default());
        assert!(policy.evaluate(&ready(authenticated()), "/students").is_none());
        assert_eq!(
            policy
                .evaluate(&ready(Session::Expired), "/students")
                .map(|r| r.to),
            Some("/".to_string())
        );
        assert_eq!(policy.evaluate(&ready(Session::Anonymous), "/students"), None);
    }

    #[derive(Clone, Default)]
    struct RecordingNavigator {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, path: &str, options: NavigateOptions) {
            assert!(options.replace);
            self.calls.lock().push(path.to_string());
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn driver_follows_store_and_location() {
        let navigator = RecordingNavigator::default();
        let calls = Arc::clone(&navigator.calls);
        let (session_tx, session_rx) = watch::channel(ready(Session::Anonymous));
        let (location_tx, location_rx) = watch::channel("/dashboard".to_string());

        let driver = RedirectDriver::new(RoutePaths::default(), navigator);
        let task = tokio::spawn(driver.run(session_rx, location_rx));

        settle().await;
        location_tx.send_replace("/".to_string());
        settle().await;
        session_tx.send_replace(ready(authenticated()));
        settle().await;
        location_tx.send_replace("/dashboard".to_string());
        settle().await;

        drop(session_tx);
        task.await.expect("driver task");
        assert_eq!(*calls.lock(), vec!["/".to_string(), "/dashboard".to_string()]);
    }
}
