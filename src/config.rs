//! Client configuration assembled from CLI flags and their environment
//! fallbacks. Configuration values are public; do not store secrets here.

use crate::identity::rest::RestIdentityConfig;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_DATA_DIR: &str = ".afiliados";
pub const DEFAULT_SESSION_HOURS: u64 = 24;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend_url: String,
    pub identity_api_key: String,
    pub identity_url: String,
    pub token_url: String,
    pub data_dir: PathBuf,
    pub admin_emails: Vec<String>,
    pub session_window: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            identity_api_key: String::new(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            admin_emails: Vec::new(),
            session_window: session_window_hours(DEFAULT_SESSION_HOURS),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn identity(&self) -> RestIdentityConfig {
        RestIdentityConfig {
            api_key: self.identity_api_key.clone(),
            identity_url: self.identity_url.clone(),
            token_url: self.token_url.clone(),
        }
    }

    /// Client-side admin gate. The backend remains authoritative.
    #[must_use]
    pub fn is_admin_email(&self, email: Option<&str>) -> bool {
        email.is_some_and(|email| {
            let email = normalize_email(email);
            self.admin_emails.iter().any(|admin| *admin == email)
        })
    }
}

#[must_use]
pub fn session_window_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(60 * 60))
}

/// Trims surrounding whitespace and trailing slashes from a base URL.
#[must_use]
pub fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[must_use]
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parses the comma-separated admin allow-list, dropping empty entries.
#[must_use]
pub fn parse_admin_emails(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_email)
        .filter(|email| !email.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_trims_slashes_and_spaces() {
        assert_eq!(normalize_base_url("  https://api.afiliados.pro/ "), "https://api.afiliados.pro");
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn admin_emails_are_normalized() {
        assert_eq!(
            parse_admin_emails(" Owner@Afiliados.pro ,, ops@afiliados.pro,"),
            vec!["owner@afiliados.pro".to_string(), "ops@afiliados.pro".to_string()]
        );
    }

    #[test]
    fn is_admin_email_is_case_insensitive() {
        let config = AppConfig {
            admin_emails: parse_admin_emails("owner@afiliados.pro"),
            ..AppConfig::default()
        };
        assert!(config.is_admin_email(Some("OWNER@afiliados.pro")));
        assert!(!config.is_admin_email(Some("user@afiliados.pro")));
        assert!(!config.is_admin_email(None));
    }

    #[test]
    fn default_session_window_is_a_day() {
        assert_eq!(AppConfig::default().session_window, Duration::from_secs(86_400));
    }
}
