//! Post-login backend provisioning.
//!
//! One bootstrap sequence runs at a time per coordinator. A sequence makes up
//! to [`ProvisioningRetry::max_attempts`] calls with linearly growing delays
//! between them; success writes a per-uid mark that suppresses any further
//! provisioning for that uid on this client.
//!
//! ```text
//! Idle -> InFlight -> Idle               (provisioned, or attempts exhausted)
//!                  -> RetryScheduled -> InFlight
//! ```

use super::{clock::SessionClock, timer::ScheduledTask};
use crate::{
    gateway::{client, types::BootstrapRequest, BackendGateway, GatewayError},
    storage::{read_timestamp, write_timestamp, KeyValueStore},
};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info, warn};

/// Prefix of the per-uid provisioning mark key.
pub const PROVISIONED_KEY_PREFIX: &str = "afp_provisioned_";

#[must_use]
pub fn provisioned_key(uid: &str) -> String {
    format!("{PROVISIONED_KEY_PREFIX}{uid}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProvisioningRetry {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ProvisioningRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl ProvisioningRetry {
    /// Delay before the attempt that follows failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisioningPhase {
    Idle,
    InFlight { uid: String, attempt: u32 },
    RetryScheduled { uid: String, attempt: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// The uid already carries a provisioning mark; nothing was sent.
    AlreadyProvisioned,
    /// Another sequence is in flight; the request was dropped.
    Busy,
    /// A background sequence was started.
    Started,
    /// The awaited first attempt succeeded.
    Provisioned,
}

#[derive(Debug)]
struct State {
    phase: ProvisioningPhase,
    generation: u64,
    abandoned: bool,
}

pub struct ProvisioningCoordinator {
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn BackendGateway>,
    clock: SessionClock,
    retry: ProvisioningRetry,
    state: Mutex<State>,
    retry_slot: ScheduledTask,
}

impl std::fmt::Debug for ProvisioningCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningCoordinator")
            .field("retry", &self.retry)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl ProvisioningCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn BackendGateway>,
        clock: SessionClock,
        retry: ProvisioningRetry,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            retry,
            state: Mutex::new(State {
                phase: ProvisioningPhase::Idle,
                generation: 0,
                abandoned: false,
            }),
            retry_slot: ScheduledTask::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn phase(&self) -> ProvisioningPhase {
        self.lock().phase.clone()
    }

    #[must_use]
    pub fn is_provisioned(&self, uid: &str) -> bool {
        read_timestamp(self.store.as_ref(), &provisioned_key(uid)).is_some()
    }

    /// Starts a background bootstrap sequence for `uid` unless it is already
    /// provisioned or another sequence is in flight.
    pub fn ensure(self: &Arc<Self>, uid: &str, request: BootstrapRequest) -> ProvisioningOutcome {
        if self.is_provisioned(uid) {
            return ProvisioningOutcome::AlreadyProvisioned;
        }
        let Some(generation) = self.claim(uid) else {
            debug!(uid = %uid, "provisioning already in flight, dropping request");
            return ProvisioningOutcome::Busy;
        };

        let coordinator = Arc::clone(self);
        let uid = uid.to_string();
        tokio::spawn(async move {
            // failures are retried or logged by the sequence itself
            let _ = coordinator.attempt(uid, request, 1, generation).await;
        });
        ProvisioningOutcome::Started
    }

    /// Runs the first attempt inline and returns its outcome. Later attempts,
    /// if any, continue in the background.
    ///
    /// # Errors
    /// Returns the gateway error of the first attempt.
    pub async fn ensure_now(
        self: &Arc<Self>,
        uid: &str,
        request: BootstrapRequest,
    ) -> Result<ProvisioningOutcome, GatewayError> {
        if self.is_provisioned(uid) {
            return Ok(ProvisioningOutcome::AlreadyProvisioned);
        }
        let Some(generation) = self.claim(uid) else {
            debug!(uid = %uid, "provisioning already in flight, dropping request");
            return Ok(ProvisioningOutcome::Busy);
        };

        Arc::clone(self)
            .attempt(uid.to_string(), request, 1, generation)
            .await
            .map(|()| ProvisioningOutcome::Provisioned)
    }

    /// Disarms any pending retry. An in-flight call is left to finish but will
    /// not schedule further attempts.
    pub fn cancel_retry(&self) {
        self.retry_slot.cancel();
        let mut state = self.lock();
        match state.phase {
            ProvisioningPhase::Idle => {}
            ProvisioningPhase::RetryScheduled { .. } => state.phase = ProvisioningPhase::Idle,
            ProvisioningPhase::InFlight { .. } => state.abandoned = true,
        }
    }

    fn claim(&self, uid: &str) -> Option<u64> {
        let mut state = self.lock();
        if matches!(state.phase, ProvisioningPhase::InFlight { .. }) {
            return None;
        }
        self.retry_slot.cancel();
        state.generation = state.generation.wrapping_add(1);
        state.abandoned = false;
        state.phase = ProvisioningPhase::InFlight {
            uid: uid.to_string(),
            attempt: 1,
        };
        Some(state.generation)
    }

    async fn attempt(
        self: Arc<Self>,
        uid: String,
        request: BootstrapRequest,
        attempt: u32,
        generation: u64,
    ) -> Result<(), GatewayError> {
        debug!(uid = %uid, attempt, "bootstrapping backend user");
        let result = client::bootstrap_user(self.gateway.as_ref(), &request).await;

        match result {
            Ok(()) => {
                if let Err(err) =
                    write_timestamp(self.store.as_ref(), &provisioned_key(&uid), self.clock.now_ms())
                {
                    warn!("Failed to persist provisioning mark: {err}");
                }
                let mut state = self.lock();
                if state.generation == generation {
                    state.phase = ProvisioningPhase::Idle;
                    self.retry_slot.cancel();
                }
                info!(uid = %uid, attempt, "backend user provisioned");
                Ok(())
            }
            Err(err) => {
                let mut state = self.lock();
                if state.generation != generation {
                    return Err(err);
                }
                if state.abandoned {
                    state.phase = ProvisioningPhase::Idle;
                    debug!(uid = %uid, attempt, "provisioning abandoned: {err}");
                } else if attempt >= self.retry.max_attempts {
                    state.phase = ProvisioningPhase::Idle;
                    warn!(uid = %uid, attempts = attempt, "Provisioning gave up: {err}");
                } else {
                    state.phase = ProvisioningPhase::RetryScheduled {
                        uid: uid.clone(),
                        attempt,
                    };
                    drop(state);
                    warn!(uid = %uid, attempt, "Provisioning attempt failed, retrying: {err}");
                    self.schedule_retry(uid, request, attempt, generation);
                }
                Err(err)
            }
        }
    }

    fn schedule_retry(
        self: &Arc<Self>,
        uid: String,
        request: BootstrapRequest,
        failed_attempt: u32,
        generation: u64,
    ) {
        let delay = self.retry.delay_after(failed_attempt);
        let coordinator = Arc::clone(self);
        self.retry_slot.schedule(delay, async move {
            coordinator
                .resume(uid, request, failed_attempt + 1, generation)
                .await;
        });
    }

    async fn resume(self: Arc<Self>, uid: String, request: BootstrapRequest, attempt: u32, generation: u64) {
        {
            let mut state = self.lock();
            let scheduled = matches!(
                &state.phase,
                ProvisioningPhase::RetryScheduled { uid: pending, .. } if *pending == uid
            );
            if !scheduled || state.generation != generation {
                return;
            }
            state.phase = ProvisioningPhase::InFlight {
                uid: uid.clone(),
                attempt,
            };
        }
        let _ = self.attempt(uid, request, attempt, generation).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        gateway::Method,
        session::fakes::{settle, unavailable, FakeGateway},
        storage::MemoryStore,
    };
    use serde_json::json;
    use tokio::time::advance;

    fn coordinator() -> (Arc<ProvisioningCoordinator>, Arc<MemoryStore>, Arc<FakeGateway>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let coordinator = Arc::new(ProvisioningCoordinator::new(
            store.clone(),
            gateway.clone(),
            SessionClock::starting_at(1_000),
            ProvisioningRetry::default(),
        ));
        (coordinator, store, gateway)
    }

    #[test]
    fn retry_delays_grow_linearly() {
        let retry = ProvisioningRetry::default();
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn success_writes_the_mark() {
        let (coordinator, store, gateway) = coordinator();
        let request = BootstrapRequest::from_form(Some("Ana"), Some("R1"));

        let outcome = coordinator.ensure_now("u1", request).await.unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Provisioned);
        assert_eq!(store.get(&provisioned_key("u1")), Some("1000".to_string()));
        assert_eq!(coordinator.phase(), ProvisioningPhase::Idle);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Method::POST);
        assert_eq!(calls[0].1, "/users/bootstrap");
        assert_eq!(calls[0].2, Some(json!({"fullName": "Ana", "referrerCode": "R1"})));
    }

    #[tokio::test(start_paused = true)]
    async fn marked_uid_is_never_provisioned_again() {
        let (coordinator, store, gateway) = coordinator();
        store.set(&provisioned_key("u1"), "5").unwrap();

        assert_eq!(
            coordinator.ensure("u1", BootstrapRequest::default()),
            ProvisioningOutcome::AlreadyProvisioned
        );
        settle().await;
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let (coordinator, store, gateway) = coordinator();
        for _ in 0..3 {
            gateway.push(Err(unavailable()));
        }

        assert_eq!(
            coordinator.ensure("u1", BootstrapRequest::default()),
            ProvisioningOutcome::Started
        );
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 1);
        assert_eq!(
            coordinator.phase(),
            ProvisioningPhase::RetryScheduled { uid: "u1".into(), attempt: 1 }
        );

        advance(Duration::from_millis(1_999)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 1);
        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 2);

        advance(Duration::from_millis(3_999)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 2);
        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 3);

        advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 3);
        assert_eq!(coordinator.phase(), ProvisioningPhase::Idle);
        assert!(store.get(&provisioned_key("u1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_that_succeeds_writes_the_mark() {
        let (coordinator, _, gateway) = coordinator();
        gateway.push(Err(unavailable()));

        let first = coordinator.ensure_now("u1", BootstrapRequest::default()).await;
        assert_eq!(first, Err(unavailable()));

        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 2);
        assert!(coordinator.is_provisioned("u1"));
        assert_eq!(coordinator.phase(), ProvisioningPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_keep_one_call_outstanding() {
        let (coordinator, _, gateway) = coordinator();
        gateway.set_latency(Duration::from_secs(1));

        assert_eq!(
            coordinator.ensure("u1", BootstrapRequest::default()),
            ProvisioningOutcome::Started
        );
        settle().await;
        assert_eq!(
            coordinator.ensure("u1", BootstrapRequest::default()),
            ProvisioningOutcome::Busy
        );
        assert_eq!(
            coordinator.ensure("u2", BootstrapRequest::default()),
            ProvisioningOutcome::Busy
        );
        assert_eq!(
            coordinator.ensure_now("u2", BootstrapRequest::default()).await,
            Ok(ProvisioningOutcome::Busy)
        );
        assert_eq!(gateway.calls().len(), 1);

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(coordinator.is_provisioned("u1"));
        assert!(!coordinator.is_provisioned("u2"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_retry_stops_a_scheduled_attempt() {
        let (coordinator, _, gateway) = coordinator();
        gateway.push(Err(unavailable()));
        coordinator.ensure("u1", BootstrapRequest::default());
        settle().await;

        coordinator.cancel_retry();
        assert_eq!(coordinator.phase(), ProvisioningPhase::Idle);

        advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_flight_prevents_retry() {
        let (coordinator, _, gateway) = coordinator();
        gateway.set_latency(Duration::from_secs(1));
        gateway.push(Err(unavailable()));
        coordinator.ensure("u1", BootstrapRequest::default());
        settle().await;

        coordinator.cancel_retry();
        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(coordinator.phase(), ProvisioningPhase::Idle);

        advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_sequence_after_cancel_ignores_the_stale_retry() {
        let (coordinator, _, gateway) = coordinator();
        gateway.push(Err(unavailable()));
        gateway.push(Err(unavailable()));
        coordinator.ensure("u1", BootstrapRequest::default());
        settle().await;

        coordinator.cancel_retry();
        coordinator.ensure("u1", BootstrapRequest::default());
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 2);

        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(gateway.count("/users/bootstrap"), 3);
        assert!(coordinator.is_provisioned("u1"));
    }
}
