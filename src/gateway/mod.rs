//! Backend API gateway. Authorized calls carry the identity provider's bearer
//! token; public calls carry none. Server unavailability and connection
//! failures are retried inside the gateway, every other non-2xx response surfaces its body as the
//! error message. Endpoint paths live in [`client`], wire types in [`types`].

pub mod client;
pub mod http;
pub mod types;

use async_trait::async_trait;
pub use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

pub use self::http::{HttpGateway, RetryPolicy};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("config error: {0}")]
    Config(String),
    #[error("no authenticated user")]
    Unauthenticated,
    #[error("server unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("response error: {0}")]
    Decode(String),
    #[error("request error: {0}")]
    Encode(String),
}

#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Sends an authorized request and returns the decoded JSON body
    /// (`Value::Null` for empty responses).
    ///
    /// # Errors
    /// Returns `Unauthenticated` without a network call when nobody is signed in.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError>;

    /// Same as [`BackendGateway::request`] without a bearer token.
    ///
    /// # Errors
    /// Returns an error on transport failures or non-2xx responses.
    async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError>;
}
