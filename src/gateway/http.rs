//! reqwest implementation of [`BackendGateway`] with consistent timeouts,
//! sanitized error bodies and a small fixed retry budget for server
//! unavailability. Only failures where the server cannot have acted on the
//! request are retried: 502/503/504 responses and connection failures. A
//! request that timed out after it was sent is never re-sent. The gateway never stores tokens; it asks the identity
//! provider for a fresh bearer token on every authorized call.

use super::{BackendGateway, GatewayError, Method};
use crate::{
    identity::{IdentityError, IdentityProvider},
    APP_USER_AGENT,
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Default request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Retry budget for unavailable servers: `max_retries` extra
/// attempts, waiting `backoff_step * n` before the n-th retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_step: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff_step.saturating_mul(retry)
    }
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    identity: Arc<dyn IdentityProvider>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            identity,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bearer_token(&self) -> Result<SecretString, GatewayError> {
        self.identity
            .current_bearer_token()
            .await
            .map_err(|err| match err {
                IdentityError::Transport(message) => {
                    GatewayError::Network(format!("Unable to refresh token: {message}"))
                }
                _ => GatewayError::Unauthenticated,
            })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<SecretString>,
    ) -> Result<Value, GatewayError> {
        let url = build_url(&self.base_url, path)?;
        let payload = body
            .map(|body| serde_json::to_vec(&body))
            .transpose()
            .map_err(|err| GatewayError::Encode(format!("Failed to encode request: {err}")))?;

        let mut retry = 0;
        loop {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .timeout(self.timeout)
                .header(CONTENT_TYPE, "application/json");
            if let Some(token) = &token {
                builder = builder.bearer_auth(token.expose_secret());
            }
            if let Some(payload) = &payload {
                builder = builder.body(payload.clone());
            }

            let (outcome, retryable) = match builder.send().await {
                Ok(response) => {
                    let outcome = handle_response(response).await;
                    let retryable = matches!(outcome, Err(GatewayError::Unavailable { .. }));
                    (outcome, retryable)
                }
                // the body never left the client
                Err(err) => (Err(map_request_error(&err)), err.is_connect()),
            };

            match outcome {
                Err(err) if retryable && retry < self.retry.max_retries => {
                    retry += 1;
                    let delay = self.retry.delay_for_retry(retry);
                    warn!(%method, path, retry, ?delay, "backend unavailable, retrying: {err}");
                    sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    #[instrument(skip(self, body))]
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        if self.base_url.trim().is_empty() {
            return Err(missing_base_url());
        }
        let token = self.bearer_token().await?;
        self.send(method, path, body, Some(token)).await
    }

    #[instrument(skip(self, body))]
    async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        self.send(method, path, body, None).await
    }
}

fn missing_base_url() -> GatewayError {
    GatewayError::Config("Missing backend URL".to_string())
}

/// Joins the configured base URL and an absolute API path.
fn build_url(base_url: &str, path: &str) -> Result<String, GatewayError> {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(missing_base_url());
    }
    Ok(format!("{}/{}", base, path.trim().trim_start_matches('/')))
}

fn map_request_error(err: &reqwest::Error) -> GatewayError {
    if err.is_connect() {
        GatewayError::Network(format!("Unable to reach the server: {err}"))
    } else if err.is_timeout() {
        GatewayError::Network("Request timed out. Please try again.".to_string())
    } else {
        GatewayError::Network(format!("Request failed: {err}"))
    }
}

fn is_unavailable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn handle_response(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body)
            .map_err(|err| GatewayError::Decode(format!("Failed to decode response: {err}")));
    }

    debug!(status = status.as_u16(), "backend returned an error response");
    let message = sanitize_body(&body);
    if is_unavailable(status) {
        Err(GatewayError::Unavailable {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(GatewayError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

/// Trims and truncates error bodies before they reach the user.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_without_double_slashes() {
        assert_eq!(
            build_url("https://api.example/ ", "/users/bootstrap"),
            Ok("https://api.example/users/bootstrap".to_string())
        );
        assert_eq!(
            build_url("https://api.example/v1/", "tools"),
            Ok("https://api.example/v1/tools".to_string())
        );
        assert_eq!(build_url("  ", "/tools"), Err(missing_base_url()));
    }

    #[test]
    fn sanitize_body_trims_and_truncates() {
        assert_eq!(sanitize_body("   "), "Request failed.");
        assert_eq!(sanitize_body("  forbidden \n"), "forbidden");
        let long = "x".repeat(500);
        assert_eq!(sanitize_body(&long).chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn retry_delays_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(1000));
    }

    #[test]
    fn only_gateway_errors_are_unavailable() {
        assert!(is_unavailable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_unavailable(StatusCode::BAD_GATEWAY));
        assert!(!is_unavailable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_unavailable(StatusCode::FORBIDDEN));
    }
}
