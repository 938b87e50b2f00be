//! Token expiry monitor.
//!
//! Armed when the session becomes `Authenticated`, disarmed on every other
//! transition. While armed it polls the decoder on a fixed interval (not the
//! token's remaining lifetime), so expiry is detected within one interval
//! after the real expiry instant and never before it.

use crate::session::token::{Clock, TokenDecoder};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

/// Policy constant; see module docs.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Invoked at most once per arming, when the held token is found expired.
pub type ExpiryCallback = Arc<dyn Fn() + Send + Sync>;

pub struct TokenExpiryMonitor {
    shared: Arc<Shared>,
}

struct Shared {
    period: Duration,
    clock: Arc<dyn Clock>,
    decoder: Arc<dyn TokenDecoder>,
    on_expired: ExpiryCallback,
    armed: Mutex<Option<Armed>>,
    generation: AtomicU64,
}

struct Armed {
    generation: u64,
    token: SecretString,
    handle: JoinHandle<()>,
}

impl TokenExpiryMonitor {
    #[must_use]
    pub fn new(
        period: Duration,
        clock: Arc<dyn Clock>,
        decoder: Arc<dyn TokenDecoder>,
        on_expired: ExpiryCallback,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                period,
                clock,
                decoder,
                on_expired,
                armed: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start watching `token`, replacing whatever was armed before.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn arm(&self, token: SecretString) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut armed = self.shared.armed.lock();
        let handle = tokio::spawn(watch_token(Arc::clone(&self.shared), generation));
        if let Some(previous) = armed.replace(Armed {
            generation,
            token,
            handle,
        }) {
            previous.handle.abort();
        }
        debug!(generation, period = ?self.shared.period, "expiry monitor armed");
    }

    pub fn disarm(&self) {
        if let Some(armed) = self.shared.armed.lock().take() {
            armed.handle.abort();
            debug!(generation = armed.generation, "expiry monitor disarmed");
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.shared.armed.lock().is_some()
    }

    /// Check immediately instead of waiting for the next tick. Returns true if
    /// this call detected the expiry; a disarmed monitor always returns false.
    pub fn check_now(&self) -> bool {
        self.shared.fire_if_expired(None)
    }
}

impl Drop for TokenExpiryMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.armed
            .lock()
            .as_ref()
            .is_some_and(|armed| armed.generation == generation)
    }

    /// `generation` is set when called from the timer task, which must only
    /// act on its own arming.
    fn fire_if_expired(&self, generation: Option<u64>) -> bool {
        let fired = {
            let mut slot = self.armed.lock();
            let Some(armed) = slot.as_ref() else {
                return false;
            };
            if generation.is_some_and(|generation| generation != armed.generation) {
                return false;
            }
            if !self
                .decoder
                .is_expired(armed.token.expose_secret(), self.clock.now())
            {
                return false;
            }
            slot.take()
        };

        let Some(fired) = fired else {
            return false;
        };
        if generation.is_none() {
            fired.handle.abort();
        }
        info!(generation = fired.generation, "session token expired");
        (self.on_expired)();
        true
    }
}

async fn watch_token(shared: Arc<Shared>, generation: u64) {
    let mut ticker = interval_at(Instant::now() + shared.period, shared.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.is_current(generation) || shared.fire_if_expired(Some(generation)) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::token::{jwt_with_exp, JwtExpiryDecoder};
    use std::sync::atomic::AtomicUsize;
    use time::OffsetDateTime;

    const NOW: i64 = 1_700_000_000;

    /// Wall clock that follows Tokio's (paused) virtual time.
    struct VirtualClock {
        base: OffsetDateTime,
        start: Instant,
    }

    impl Clock for VirtualClock {
        fn now(&self) -> OffsetDateTime {
            self.base + self.start.elapsed()
        }
    }

    fn monitor() -> (TokenExpiryMonitor, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let clock = VirtualClock {
            base: OffsetDateTime::from_unix_timestamp(NOW).expect("valid timestamp"),
            start: Instant::now(),
        };
        let monitor = TokenExpiryMonitor::new(
            DEFAULT_EXPIRY_CHECK_INTERVAL,
            Arc::new(clock),
            Arc::new(JwtExpiryDecoder),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (monitor, fired)
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_within_one_interval_after_expiry() {
        let (monitor, fired) = monitor();
        monitor.arm(SecretString::from(jwt_with_exp(NOW + 45)));

        // Tick at 30s: token still valid.
        sleep_secs(31).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(monitor.is_armed());

        // Tick at 60s: expired 15s ago.
        sleep_secs(30).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_armed());

        sleep_secs(120).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!monitor.check_now());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_monitor_never_fires() {
        let (monitor, fired) = monitor();
        monitor.arm(SecretString::from(jwt_with_exp(NOW - 1)));
        monitor.disarm();

        sleep_secs(90).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!monitor.check_now());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_watched_token() {
        let (monitor, fired) = monitor();
        monitor.arm(SecretString::from(jwt_with_exp(NOW - 1)));
        monitor.arm(SecretString::from(jwt_with_exp(NOW + 3600)));

        sleep_secs(95).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(monitor.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn check_now_detects_expiry_between_ticks() {
        let (monitor, fired) = monitor();
        monitor.arm(SecretString::from("not-a-jwt"));

        assert!(monitor.check_now());
        assert!(!monitor.check_now());
        sleep_secs(60).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
