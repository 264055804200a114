//! Identity provider capability. The provider verifies credentials, issues
//! short-lived bearer tokens and reports identity changes; this module only
//! describes the contract the session core relies on, plus the fan-out used by
//! implementations to deliver identity-changed events.
//!
//! Security boundaries: passwords and tokens cross this interface as
//! `SecretString` and must never be logged.

pub mod rest;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Credential method an account can authenticate with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    Social,
}

impl AuthMethod {
    /// Maps a provider id (`password`, `google.com`, ...) onto a method.
    #[must_use]
    pub fn from_provider_id(provider_id: &str) -> Option<Self> {
        match provider_id.trim() {
            "password" => Some(Self::Password),
            "google.com" => Some(Self::Social),
            _ => None,
        }
    }
}

/// The signed-in principal, read-only to this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub methods: Vec<AuthMethod>,
}

impl Identity {
    #[must_use]
    pub fn has_method(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Credential problems reported verbatim to the user and never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("email already in use")]
    EmailInUse,
    #[error("invalid email")]
    InvalidEmail,
    #[error("wrong password")]
    WrongPassword,
    #[error("weak password")]
    WeakPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("user disabled")]
    UserDisabled,
    #[error("too many attempts, try again later")]
    TooManyAttempts,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("recent login required")]
    RecentLoginRequired,
    #[error("no authenticated user")]
    Unauthenticated,
    #[error("interactive sign-in was cancelled")]
    Cancelled,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Receiver of identity-changed events. The current identity is delivered
/// first; dropping the receiver unsubscribes.
pub type IdentitySubscription = mpsc::UnboundedReceiver<Option<Identity>>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Errors
    /// Returns a credential error for bad email/password combinations.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, IdentityError>;

    /// Interactive social sign-in; may be cancelled by the user.
    ///
    /// # Errors
    /// Returns `Cancelled` when the user dismisses the prompt.
    async fn sign_in_with_social(&self) -> Result<Identity, IdentityError>;

    /// # Errors
    /// Returns a credential error if the email is taken or the password too weak.
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<Identity, IdentityError>;

    /// # Errors
    /// Returns an error if the provider could not clear its local state.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Subscribes to identity changes.
    fn subscribe(&self) -> IdentitySubscription;

    /// The identity as currently known to the provider.
    fn current_identity(&self) -> Option<Identity>;

    /// # Errors
    /// Returns `WrongPassword` when the password does not match.
    async fn reauthenticate_with_password(
        &self,
        current_password: &SecretString,
    ) -> Result<(), IdentityError>;

    /// # Errors
    /// Returns `Cancelled` when the user dismisses the prompt.
    async fn reauthenticate_with_social(&self) -> Result<(), IdentityError>;

    /// # Errors
    /// Returns `RecentLoginRequired` when the last login is too old.
    async fn update_email(&self, new_email: &str) -> Result<(), IdentityError>;

    /// # Errors
    /// Returns `RecentLoginRequired` when the last login is too old.
    async fn update_password(&self, new_password: &SecretString) -> Result<(), IdentityError>;

    /// # Errors
    /// Returns an error if the provider rejects the update.
    async fn update_display_name(&self, name: &str) -> Result<(), IdentityError>;

    /// Returns a fresh bearer token for the signed-in identity.
    ///
    /// # Errors
    /// Returns `Unauthenticated` when nobody is signed in.
    async fn current_bearer_token(&self) -> Result<SecretString, IdentityError>;
}

/// Fan-out of identity-changed events to any number of subscribers.
#[derive(Debug, Default)]
pub struct IdentityEvents {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Option<Identity>>>>,
}

impl IdentityEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<Option<Identity>>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber and immediately delivers `current` to it.
    pub fn subscribe(&self, current: Option<Identity>) -> IdentitySubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // a fresh channel cannot be closed yet
        let _ = sender.send(current);
        self.lock().push(sender);
        receiver
    }

    /// Delivers `identity` to every live subscriber, dropping closed ones.
    pub fn emit(&self, identity: &Option<Identity>) {
        self.lock()
            .retain(|sender| sender.send(identity.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }
}
