//! Locally enforced session window.
//!
//! The window is measured from the first observation of an identity and is
//! independent of the identity provider's own token lifetime. A single
//! deferred callback signs the identity out once the window closes.

use super::{clock::SessionClock, timer::ScheduledTask};
use crate::{
    identity::IdentityProvider,
    storage::{read_timestamp, write_timestamp, KeyValueStore},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Local store key holding the session start in epoch milliseconds.
pub const SESSION_STARTED_AT_KEY: &str = "afp_session_started_at";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionVerdict {
    Active { expires_at_ms: i64 },
    Expired,
}

impl SessionVerdict {
    #[must_use]
    pub fn is_expired(self) -> bool {
        matches!(self, Self::Expired)
    }
}

pub struct SessionPolicy {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn IdentityProvider>,
    clock: SessionClock,
    window: Duration,
    expiry: ScheduledTask,
}

impl std::fmt::Debug for SessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPolicy")
            .field("window", &self.window)
            .field("armed", &self.expiry.is_armed())
            .finish_non_exhaustive()
    }
}

impl SessionPolicy {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: SessionClock,
        window: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            window,
            expiry: ScheduledTask::new(),
        }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<i64> {
        read_timestamp(self.store.as_ref(), SESSION_STARTED_AT_KEY)
    }

    /// Classifies the current session, stamping a fresh record when none exists.
    pub fn evaluate(&self) -> SessionVerdict {
        let now = self.clock.now_ms();
        let window = self.window_ms();

        let Some(started_at) = self.started_at() else {
            self.stamp(now);
            self.arm(window);
            debug!(started_at = now, "session clock started");
            return SessionVerdict::Active {
                expires_at_ms: now.saturating_add(window),
            };
        };

        let elapsed = now.saturating_sub(started_at);
        if elapsed > window {
            self.expiry.cancel();
            self.remove_record();
            info!(started_at, elapsed_ms = elapsed, "session window elapsed");
            return SessionVerdict::Expired;
        }

        let remaining = window - elapsed;
        self.arm(remaining);
        SessionVerdict::Active {
            expires_at_ms: started_at.saturating_add(window),
        }
    }

    /// Restarts the window from now, overriding any existing record.
    pub fn touch(&self) -> i64 {
        let now = self.clock.now_ms();
        self.stamp(now);
        self.arm(self.window_ms());
        debug!(started_at = now, "session clock restarted");
        now.saturating_add(self.window_ms())
    }

    /// Disarms the expiry timer and drops the session record.
    pub fn clear(&self) {
        self.expiry.cancel();
        self.remove_record();
    }

    /// Disarms the expiry timer, keeping the record.
    pub fn cancel(&self) {
        self.expiry.cancel();
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.expiry.is_armed()
    }

    /// Time left in the current window, if a session clock is running.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let started_at = self.started_at()?;
        let left = started_at
            .saturating_add(self.window_ms())
            .saturating_sub(self.clock.now_ms());
        Some(Duration::from_millis(u64::try_from(left).unwrap_or(0)))
    }

    fn stamp(&self, now: i64) {
        if let Err(err) = write_timestamp(self.store.as_ref(), SESSION_STARTED_AT_KEY, now) {
            warn!("Failed to persist session start: {err}");
        }
    }

    fn remove_record(&self) {
        if let Err(err) = self.store.remove(SESSION_STARTED_AT_KEY) {
            warn!("Failed to remove session record: {err}");
        }
    }

    fn arm(&self, remaining_ms: i64) {
        let Ok(remaining_ms) = u64::try_from(remaining_ms) else {
            self.expiry.cancel();
            return;
        };
        if remaining_ms == 0 {
            self.expiry.cancel();
            return;
        }

        let store = Arc::clone(&self.store);
        let provider = Arc::clone(&self.provider);
        self.expiry
            .schedule(Duration::from_millis(remaining_ms), async move {
                info!("session window closed, signing out");
                if let Err(err) = store.remove(SESSION_STARTED_AT_KEY) {
                    warn!("Failed to remove session record: {err}");
                }
                if let Err(err) = provider.sign_out().await {
                    warn!("Automatic sign-out failed: {err}");
                }
            });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        session::fakes::{settle, FakeProvider},
        storage::MemoryStore,
    };
    use tokio::time::advance;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const T0: i64 = 1_700_000_000_000;

    fn policy() -> (SessionPolicy, Arc<MemoryStore>, Arc<FakeProvider>) {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::default());
        let policy = SessionPolicy::new(
            store.clone(),
            provider.clone(),
            SessionClock::starting_at(T0),
            Duration::from_secs(24 * 60 * 60),
        );
        (policy, store, provider)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_identity_is_stamped_and_armed() {
        let (policy, store, _) = policy();
        assert_eq!(
            policy.evaluate(),
            SessionVerdict::Active { expires_at_ms: T0 + 24 * HOUR_MS }
        );
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), Some(T0.to_string()));
        assert!(policy.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn second_evaluate_keeps_the_original_stamp() {
        let (policy, store, _) = policy();
        policy.evaluate();
        advance(Duration::from_secs(30)).await;
        policy.evaluate();
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), Some(T0.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_record_is_expired_and_deleted() {
        let (policy, store, provider) = policy();
        store
            .set(SESSION_STARTED_AT_KEY, &(T0 - 25 * HOUR_MS).to_string())
            .unwrap();
        assert_eq!(policy.evaluate(), SessionVerdict::Expired);
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), None);
        assert!(!policy.is_armed());
        // the caller forces the sign-out, not the policy
        assert_eq!(provider.count("sign_out"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn record_exactly_at_the_boundary_stays_active_without_timer() {
        let (policy, store, _) = policy();
        store
            .set(SESSION_STARTED_AT_KEY, &(T0 - 24 * HOUR_MS).to_string())
            .unwrap();
        assert_eq!(policy.evaluate(), SessionVerdict::Active { expires_at_ms: T0 });
        assert!(!policy.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_signs_out_at_the_deadline_and_not_before() {
        let (policy, store, provider) = policy();
        store
            .set(SESSION_STARTED_AT_KEY, &(T0 - 23 * HOUR_MS).to_string())
            .unwrap();
        policy.evaluate();
        settle().await;

        advance(Duration::from_secs(60 * 60) - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(provider.count("sign_out"), 0);

        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(provider.count("sign_out"), 1);
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), None);

        advance(Duration::from_secs(48 * 60 * 60)).await;
        settle().await;
        assert_eq!(provider.count("sign_out"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_the_deadline() {
        let (policy, store, provider) = policy();
        store
            .set(SESSION_STARTED_AT_KEY, &(T0 - 23 * HOUR_MS).to_string())
            .unwrap();
        policy.evaluate();
        settle().await;

        advance(Duration::from_secs(30 * 60)).await;
        let expires_at = policy.touch();
        assert_eq!(expires_at, T0 + 30 * 60 * 1000 + 24 * HOUR_MS);
        assert_eq!(policy.remaining(), Some(Duration::from_secs(24 * 60 * 60)));

        advance(Duration::from_secs(2 * 60 * 60)).await;
        settle().await;
        assert_eq!(provider.count("sign_out"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_disarms_and_removes_record() {
        let (policy, store, provider) = policy();
        policy.evaluate();
        policy.clear();
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), None);
        assert_eq!(policy.remaining(), None);

        advance(Duration::from_secs(25 * 60 * 60)).await;
        settle().await;
        assert_eq!(provider.count("sign_out"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_record_counts_as_absent() {
        let (policy, store, _) = policy();
        store.set(SESSION_STARTED_AT_KEY, "not-a-number").unwrap();
        assert!(!policy.evaluate().is_expired());
        assert_eq!(store.get(SESSION_STARTED_AT_KEY), Some(T0.to_string()));
    }
}
