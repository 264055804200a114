//! Session and identity lifecycle.
//!
//! [`SessionStore`] is the single owner of the signed-in state. Once started
//! it consumes the identity provider's identity-changed events, runs every
//! event through the session window ([`policy`]) and backend provisioning
//! ([`provisioning`]), and only then publishes the new [`SessionState`].
//! Sensitive account mutations go through [`reauth::AccountSecurity`].
//!
//! Lifecycle: `new` builds the components, `start` subscribes once, and
//! `shutdown` (also run on drop) unsubscribes and disarms every timer.

pub mod clock;
pub mod policy;
pub mod provisioning;
pub mod reauth;
pub mod timer;

#[cfg(test)]
pub(crate) mod fakes;

use crate::{
    errors::AccountError,
    gateway::{types::BootstrapRequest, BackendGateway},
    identity::{Identity, IdentityError, IdentityProvider},
    storage::KeyValueStore,
};
use secrecy::SecretString;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

pub use self::{
    clock::SessionClock,
    policy::{SessionPolicy, SessionVerdict, SESSION_STARTED_AT_KEY},
    provisioning::{
        provisioned_key, ProvisioningCoordinator, ProvisioningOutcome, ProvisioningPhase,
        ProvisioningRetry,
    },
    reauth::{AccountSecurity, PasswordChange, ProfileChange, ProfileUpdate},
    timer::ScheduledTask,
};

/// Published session state. `loading` is true only until the first identity
/// resolution has been processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub window: Duration,
    pub retry: ProvisioningRetry,
    pub clock: SessionClock,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(24 * 60 * 60),
            retry: ProvisioningRetry::default(),
            clock: SessionClock::system(),
        }
    }
}

/// Credentials and profile fields collected by the sign-up form.
#[derive(Debug)]
pub struct SignUp {
    pub email: String,
    pub password: SecretString,
    pub full_name: Option<String>,
    pub referrer_code: Option<String>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    policy: SessionPolicy,
    provisioning: Arc<ProvisioningCoordinator>,
    state: watch::Sender<SessionState>,
    interactive: AtomicBool,
}

impl Inner {
    fn publish(&self, identity: Option<Identity>) {
        self.state.send_replace(SessionState {
            identity,
            loading: false,
        });
    }

    async fn on_identity_changed(&self, identity: Option<Identity>) {
        self.policy.cancel();

        let Some(identity) = identity else {
            self.provisioning.cancel_retry();
            self.policy.clear();
            self.publish(None);
            debug!("identity cleared");
            return;
        };

        if self.interactive.swap(false, Ordering::SeqCst) {
            // the interactive caller owns the provisioning sequence, including its retries
            self.policy.touch();
        } else {
            self.provisioning.cancel_retry();
            if self.policy.evaluate().is_expired() {
                info!(uid = %identity.uid, "session expired, forcing sign-out");
                if let Err(err) = self.provider.sign_out().await {
                    warn!("Forced sign-out failed: {err}");
                }
                self.publish(None);
                return;
            }
            if !self.provisioning.is_provisioned(&identity.uid) {
                self.provisioning
                    .ensure(&identity.uid, BootstrapRequest::default());
            }
        }

        debug!(uid = %identity.uid, "identity resolved");
        self.publish(Some(identity));
    }
}

pub struct SessionStore {
    inner: Arc<Inner>,
    security: AccountSecurity,
    events: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.borrow())
            .field("policy", &self.inner.policy)
            .field("provisioning", &self.inner.provisioning)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn BackendGateway>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Self {
        let policy = SessionPolicy::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            options.clock,
            options.window,
        );
        let provisioning = Arc::new(ProvisioningCoordinator::new(
            store,
            Arc::clone(&gateway),
            options.clock,
            options.retry,
        ));
        let security = AccountSecurity::new(Arc::clone(&provider), gateway);
        let (state, _) = watch::channel(SessionState::default());

        Self {
            inner: Arc::new(Inner {
                provider,
                policy,
                provisioning,
                state,
                interactive: AtomicBool::new(false),
            }),
            security,
            events: Mutex::new(None),
        }
    }

    fn events(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to identity changes. Calling it again is a no-op.
    pub fn start(&self) {
        let mut events = self.events();
        if events.is_some() {
            return;
        }

        let mut subscription = self.inner.provider.subscribe();
        let inner = Arc::clone(&self.inner);
        *events = Some(tokio::spawn(async move {
            while let Some(identity) = subscription.recv().await {
                inner.on_identity_changed(identity).await;
            }
            debug!("identity subscription closed");
        }));
    }

    /// Unsubscribes and disarms the expiry and retry timers.
    pub fn shutdown(&self) {
        if let Some(handle) = self.events().take() {
            handle.abort();
        }
        self.inner.policy.cancel();
        self.inner.provisioning.cancel_retry();
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Waits for the first identity resolution.
    pub async fn ready(&self) -> SessionState {
        let mut receiver = self.inner.state.subscribe();
        let resolved = match receiver.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        resolved
    }

    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    #[must_use]
    pub fn provisioning(&self) -> &ProvisioningCoordinator {
        &self.inner.provisioning
    }

    #[must_use]
    pub fn account(&self) -> &AccountSecurity {
        &self.security
    }

    /// # Errors
    /// Returns the provider's credential error, or `Backend` when the
    /// identity was signed in but the first provisioning attempt failed.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, AccountError> {
        let identity = self
            .interactive(self.inner.provider.sign_in_with_password(email.trim(), password))
            .await?;
        self.after_interactive(&identity, BootstrapRequest::default())
            .await?;
        Ok(identity)
    }

    /// # Errors
    /// Returns `Cancelled` when the user dismisses the prompt, or `Backend`
    /// when the first provisioning attempt failed.
    pub async fn sign_in_with_social(&self) -> Result<Identity, AccountError> {
        let identity = self
            .interactive(self.inner.provider.sign_in_with_social())
            .await?;
        self.after_interactive(&identity, BootstrapRequest::default())
            .await?;
        Ok(identity)
    }

    /// # Errors
    /// Returns the provider's credential error, or `Backend` when the
    /// account was created but the first provisioning attempt failed.
    pub async fn sign_up(&self, sign_up: &SignUp) -> Result<Identity, AccountError> {
        let request = BootstrapRequest::from_form(
            sign_up.full_name.as_deref(),
            sign_up.referrer_code.as_deref(),
        );
        let identity = self
            .interactive(self.inner.provider.sign_up_with_password(
                sign_up.email.trim(),
                &sign_up.password,
                request.full_name.as_deref(),
            ))
            .await?;
        self.after_interactive(&identity, request).await?;
        Ok(identity)
    }

    /// Cancels both timers, drops the session record and signs out at the
    /// provider.
    ///
    /// # Errors
    /// Returns the provider's error.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        self.inner.policy.clear();
        self.inner.provisioning.cancel_retry();
        self.inner.provider.sign_out().await?;
        info!("signed out");
        Ok(())
    }

    async fn interactive<F>(&self, call: F) -> Result<Identity, AccountError>
    where
        F: Future<Output = Result<Identity, IdentityError>>,
    {
        self.inner.interactive.store(true, Ordering::SeqCst);
        match call.await {
            Ok(identity) => Ok(identity),
            Err(err) => {
                self.inner.interactive.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    async fn after_interactive(
        &self,
        identity: &Identity,
        request: BootstrapRequest,
    ) -> Result<(), AccountError> {
        self.inner.policy.touch();
        let outcome = self
            .inner
            .provisioning
            .ensure_now(&identity.uid, request)
            .await?;
        debug!(uid = %identity.uid, ?outcome, "interactive provisioning");
        Ok(())
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
