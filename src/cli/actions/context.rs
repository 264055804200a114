//! Per-invocation session wiring: local store, identity provider, backend
//! gateway and the session store, started and resolved before any action runs.

use crate::{
    cli::globals::GlobalArgs,
    config::AppConfig,
    errors::AccountError,
    gateway::{BackendGateway, HttpGateway},
    identity::{rest::RestIdentityProvider, Identity, IdentityProvider},
    session::{SessionOptions, SessionState, SessionStore},
    storage::{FileStore, KeyValueStore},
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub struct Session {
    pub config: AppConfig,
    pub store: SessionStore,
    pub gateway: Arc<dyn BackendGateway>,
}

impl Session {
    /// Builds the components and waits for the first identity resolution.
    ///
    /// # Errors
    /// Returns an error if the local store cannot be opened or a client cannot be built.
    pub async fn open(globals: &GlobalArgs) -> Result<Self> {
        let config = globals.config();

        let local: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(&config.data_dir).with_context(|| {
                format!("Failed to open local store in {}", config.data_dir.display())
            })?,
        );
        let provider: Arc<dyn IdentityProvider> = Arc::new(
            RestIdentityProvider::new(config.identity(), Arc::clone(&local))
                .context("Failed to build identity provider client")?,
        );
        let gateway: Arc<dyn BackendGateway> = Arc::new(
            HttpGateway::new(config.backend_url.clone(), Arc::clone(&provider))
                .context("Failed to build backend client")?,
        );

        let store = SessionStore::new(
            provider,
            Arc::clone(&gateway),
            local,
            SessionOptions {
                window: config.session_window,
                ..SessionOptions::default()
            },
        );
        store.start();
        let state = store.ready().await;
        debug!(
            signed_in = state.identity.is_some(),
            "session resolved"
        );

        Ok(Self {
            config,
            store,
            gateway,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.store.state()
    }

    /// # Errors
    /// Returns an error when nobody is signed in.
    pub fn require_identity(&self) -> Result<Identity> {
        self.state()
            .identity
            .ok_or_else(|| anyhow!("Not signed in. Run `afiliados signin` first."))
    }

    /// # Errors
    /// Returns an error when nobody is signed in or the account is not an admin.
    pub fn require_admin(&self) -> Result<Identity> {
        let identity = self.require_identity()?;
        if !self.config.is_admin_email(identity.email.as_deref()) {
            return Err(anyhow!("This account does not have admin access."));
        }
        Ok(identity)
    }

    pub fn close(self) {
        self.store.shutdown();
    }
}

/// Wraps an account error with its user-facing message.
pub fn account_error(err: AccountError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// Prints `value` as pretty JSON on stdout.
///
/// # Errors
/// Returns an error if the value cannot be serialized.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
