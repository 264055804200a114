use crate::config::{normalize_base_url, session_window_hours, AppConfig};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

/// Settings shared by every subcommand.
#[derive(Clone)]
pub struct GlobalArgs {
    pub backend_url: String,
    pub identity_api_key: SecretString,
    pub identity_url: String,
    pub token_url: String,
    pub data_dir: PathBuf,
    pub admin_emails: Vec<String>,
    pub session_hours: u64,
}

impl GlobalArgs {
    #[must_use]
    pub fn config(&self) -> AppConfig {
        AppConfig {
            backend_url: normalize_base_url(&self.backend_url),
            identity_api_key: self.identity_api_key.expose_secret().to_string(),
            identity_url: normalize_base_url(&self.identity_url),
            token_url: normalize_base_url(&self.token_url),
            data_dir: self.data_dir.clone(),
            admin_emails: self.admin_emails.clone(),
            session_window: session_window_hours(self.session_hours),
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("backend_url", &self.backend_url)
            .field("identity_api_key", &"***")
            .field("identity_url", &self.identity_url)
            .field("token_url", &self.token_url)
            .field("data_dir", &self.data_dir)
            .field("admin_emails", &self.admin_emails)
            .field("session_hours", &self.session_hours)
            .finish()
    }
}
