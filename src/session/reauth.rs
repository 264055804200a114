//! Step-up re-authentication for sensitive account mutations.
//!
//! Email and password changes require a recent login at the identity
//! provider, so the account re-proves itself first with whichever credential
//! method it actually uses. Backend propagation of a profile change happens
//! after the provider mutation and is never rolled back.

use crate::{
    errors::AccountError,
    gateway::{client, types::ProfileSync, BackendGateway},
    identity::{AuthMethod, Identity, IdentityError, IdentityProvider},
};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

/// Checks a new password before any provider call is made.
///
/// # Errors
/// Returns `Validation` when the password is too short or the confirmation differs.
pub fn validate_new_password(
    new_password: &SecretString,
    confirmation: &SecretString,
) -> Result<(), AccountError> {
    let new_password = new_password.expose_secret();
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::Validation(format!(
            "The new password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    if new_password != confirmation.expose_secret() {
        return Err(AccountError::Validation(
            "The password confirmation does not match.".to_string(),
        ));
    }
    Ok(())
}

/// Requested profile values; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<SecretString>,
}

#[derive(Debug)]
pub struct PasswordChange {
    pub current_password: Option<SecretString>,
    pub new_password: SecretString,
    pub confirmation: SecretString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileChange {
    Unchanged,
    Updated {
        full_name: String,
        email: String,
        name_changed: bool,
        email_changed: bool,
    },
}

pub struct AccountSecurity {
    provider: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn BackendGateway>,
}

impl std::fmt::Debug for AccountSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSecurity").finish_non_exhaustive()
    }
}

impl AccountSecurity {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, gateway: Arc<dyn BackendGateway>) -> Self {
        Self { provider, gateway }
    }

    fn current_identity(&self) -> Result<Identity, AccountError> {
        self.provider
            .current_identity()
            .ok_or(AccountError::Identity(IdentityError::Unauthenticated))
    }

    /// Re-proves `identity` with its password when it has one, otherwise
    /// through the interactive social flow.
    ///
    /// # Errors
    /// Returns `MissingCredential` for password accounts without a supplied
    /// password, `UnsupportedProvider` when no known method is present, or the
    /// provider's error.
    pub async fn reauthenticate(
        &self,
        identity: &Identity,
        current_password: Option<&SecretString>,
    ) -> Result<(), AccountError> {
        if identity.has_method(AuthMethod::Password) {
            let password = current_password
                .filter(|password| !password.expose_secret().is_empty())
                .ok_or(AccountError::MissingCredential)?;
            debug!(uid = %identity.uid, "re-authenticating with password");
            self.provider.reauthenticate_with_password(password).await?;
            return Ok(());
        }

        if identity.has_method(AuthMethod::Social) {
            debug!(uid = %identity.uid, "re-authenticating with social provider");
            self.provider.reauthenticate_with_social().await?;
            return Ok(());
        }

        Err(AccountError::UnsupportedProvider)
    }

    /// Applies name and email changes, then syncs `PATCH /me`.
    ///
    /// # Errors
    /// Returns `Validation` for a blank or malformed email, any
    /// re-authentication or provider error, or `ProfileSync` when only the
    /// backend propagation failed.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileChange, AccountError> {
        let identity = self.current_identity()?;
        let current_name = identity.display_name.clone().unwrap_or_default();
        let current_email = identity.email.clone().unwrap_or_default();

        let full_name = update
            .full_name
            .as_deref()
            .map_or_else(|| current_name.clone(), |name| name.trim().to_string());
        let email = update
            .email
            .as_deref()
            .map_or_else(|| current_email.clone(), |email| email.trim().to_string());

        let name_changed = full_name != current_name;
        let email_changed = email != current_email;
        if !name_changed && !email_changed {
            return Ok(ProfileChange::Unchanged);
        }

        if email_changed {
            if email.is_empty() {
                return Err(AccountError::Validation("Email is required.".to_string()));
            }
            if !valid_email(&email) {
                return Err(AccountError::Validation("Invalid email.".to_string()));
            }
            self.reauthenticate(&identity, update.current_password.as_ref())
                .await?;
            self.provider.update_email(&email).await?;
            info!(uid = %identity.uid, "email updated at identity provider");
        }

        if name_changed {
            self.provider.update_display_name(&full_name).await?;
        }

        let profile = ProfileSync {
            full_name: full_name.clone(),
            email: email.clone(),
        };
        if let Err(err) = client::update_me(self.gateway.as_ref(), &profile).await {
            warn!(uid = %identity.uid, "Profile sync failed: {err}");
            return Err(AccountError::ProfileSync(err));
        }

        Ok(ProfileChange::Updated {
            full_name,
            email,
            name_changed,
            email_changed,
        })
    }

    /// # Errors
    /// Returns `Validation` before any provider call when the new password is
    /// too short or unconfirmed, then any re-authentication or provider error.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), AccountError> {
        validate_new_password(&change.new_password, &change.confirmation)?;
        let identity = self.current_identity()?;
        self.reauthenticate(&identity, change.current_password.as_ref())
            .await?;
        self.provider.update_password(&change.new_password).await?;
        info!(uid = %identity.uid, "password updated");
        Ok(())
    }
}
