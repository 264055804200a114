use crate::{
    gateway::GatewayError,
    identity::{CredentialError, IdentityError},
};
use thiserror::Error;

/// Errors surfaced by session and account operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("current password is required")]
    MissingCredential,
    #[error("account has no supported sign-in method")]
    UnsupportedProvider,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Backend(#[from] GatewayError),
    /// The identity provider already applied the change; only the backend
    /// propagation failed.
    #[error("profile updated, but syncing it to the backend failed: {0}")]
    ProfileSync(GatewayError),
}

impl AccountError {
    /// Short message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::MissingCredential => "Enter your current password.".to_string(),
            Self::UnsupportedProvider => {
                "This account cannot be re-verified with a supported sign-in method.".to_string()
            }
            Self::Identity(IdentityError::Credential(credential)) => match credential {
                CredentialError::EmailInUse => "That email is already in use.".to_string(),
                CredentialError::InvalidEmail => "Invalid email.".to_string(),
                CredentialError::WrongPassword => "The current password is incorrect.".to_string(),
                CredentialError::WeakPassword => "The new password is too weak.".to_string(),
                CredentialError::UserNotFound => "No account matches that email.".to_string(),
                CredentialError::UserDisabled => "This account has been disabled.".to_string(),
                CredentialError::TooManyAttempts => {
                    "Too many attempts. Try again later.".to_string()
                }
            },
            Self::Identity(IdentityError::RecentLoginRequired) => {
                "Sign in again and retry.".to_string()
            }
            Self::Identity(IdentityError::Unauthenticated) => "You are not signed in.".to_string(),
            Self::Identity(IdentityError::Cancelled) => "Sign-in was cancelled.".to_string(),
            Self::Backend(GatewayError::Http { message, .. }) => message.clone(),
            Self::ProfileSync(_) => {
                "Your profile was updated, but the server copy could not be refreshed.".to_string()
            }
            _ => "Could not complete the request.".to_string(),
        }
    }
}
