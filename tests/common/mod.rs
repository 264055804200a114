//! Shared fakes for the integration suites.
#![allow(dead_code, clippy::unwrap_used)]

use afiliados::{
    gateway::{BackendGateway, GatewayError, Method},
    identity::{
        AuthMethod, CredentialError, Identity, IdentityError, IdentityEvents, IdentityProvider,
        IdentitySubscription,
    },
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

pub const T0: i64 = 1_700_000_000_000;
pub const HOUR_MS: i64 = 60 * 60 * 1000;

pub fn account(uid: &str, methods: &[AuthMethod]) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: Some(format!("User {uid}")),
        email: Some(format!("{uid}@example.com")),
        methods: methods.to_vec(),
    }
}

pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Identity provider holding one account in memory.
#[derive(Default)]
pub struct TestProvider {
    pub events: IdentityEvents,
    current: Mutex<Option<Identity>>,
    password: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl TestProvider {
    pub fn signed_in(identity: Identity, password: &str) -> Arc<Self> {
        let provider = Self::default();
        *provider.current.lock().unwrap() = Some(identity);
        *provider.password.lock().unwrap() = Some(password.to_string());
        Arc::new(provider)
    }

    /// Signed out, but `password` is accepted by the next sign-in.
    pub fn signed_out(password: &str) -> Arc<Self> {
        let provider = Self::default();
        *provider.password.lock().unwrap() = Some(password.to_string());
        Arc::new(provider)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn replace(&self, identity: Option<Identity>) {
        self.current.lock().unwrap().clone_from(&identity);
        self.events.emit(&identity);
    }
}

#[async_trait]
impl IdentityProvider for TestProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, IdentityError> {
        self.record(format!("sign_in_with_password:{email}"));
        let expected = self.password.lock().unwrap().clone();
        if expected.as_deref() != Some(password.expose_secret()) {
            return Err(CredentialError::WrongPassword.into());
        }
        let identity = Identity {
            uid: email.split('@').next().unwrap_or("user").to_string(),
            display_name: None,
            email: Some(email.to_string()),
            methods: vec![AuthMethod::Password],
        };
        self.replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_social(&self) -> Result<Identity, IdentityError> {
        self.record("sign_in_with_social".to_string());
        let identity = account("social-user", &[AuthMethod::Social]);
        self.replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        self.record(format!("sign_up_with_password:{email}"));
        *self.password.lock().unwrap() = Some(password.expose_secret().to_string());
        let identity = Identity {
            uid: "new-user".to_string(),
            display_name: display_name.map(str::to_string),
            email: Some(email.to_string()),
            methods: vec![AuthMethod::Password],
        };
        self.replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.record("sign_out".to_string());
        self.replace(None);
        Ok(())
    }

    fn subscribe(&self) -> IdentitySubscription {
        self.events.subscribe(self.current_identity())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }

    async fn reauthenticate_with_password(
        &self,
        current_password: &SecretString,
    ) -> Result<(), IdentityError> {
        self.record("reauthenticate_with_password".to_string());
        let expected = self.password.lock().unwrap().clone();
        if expected.as_deref() == Some(current_password.expose_secret()) {
            Ok(())
        } else {
            Err(CredentialError::WrongPassword.into())
        }
    }

    async fn reauthenticate_with_social(&self) -> Result<(), IdentityError> {
        self.record("reauthenticate_with_social".to_string());
        Ok(())
    }

    async fn update_email(&self, new_email: &str) -> Result<(), IdentityError> {
        self.record(format!("update_email:{new_email}"));
        if let Some(identity) = self.current.lock().unwrap().as_mut() {
            identity.email = Some(new_email.to_string());
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &SecretString) -> Result<(), IdentityError> {
        self.record("update_password".to_string());
        *self.password.lock().unwrap() = Some(new_password.expose_secret().to_string());
        Ok(())
    }

    async fn update_display_name(&self, name: &str) -> Result<(), IdentityError> {
        self.record(format!("update_display_name:{name}"));
        if let Some(identity) = self.current.lock().unwrap().as_mut() {
            identity.display_name = Some(name.to_string());
        }
        Ok(())
    }

    async fn current_bearer_token(&self) -> Result<SecretString, IdentityError> {
        match self.current_identity() {
            Some(identity) => Ok(SecretString::from(format!("token-{}", identity.uid))),
            None => Err(IdentityError::Unauthenticated),
        }
    }
}

pub type Call = (Method, String, Option<Value>);

/// Gateway that records every call and answers from a per-path script,
/// `Ok(Null)` once the script for that path is exhausted.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Vec<(String, VecDeque<Result<Value, GatewayError>>)>>,
    latency: Mutex<Option<Duration>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, outcome: Result<Value, GatewayError>) {
        let mut script = self.script.lock().unwrap();
        if let Some((_, queue)) = script.iter_mut().find(|(p, _)| p == path) {
            queue.push_back(outcome);
        } else {
            script.push((path.to_string(), VecDeque::from([outcome])));
        }
    }

    /// Every call waits `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bodies(&self, path: &str) -> Vec<Option<Value>> {
        self.calls()
            .into_iter()
            .filter(|(_, p, _)| p == path)
            .map(|(_, _, body)| body)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.bodies(path).len()
    }
}

pub fn unavailable() -> GatewayError {
    GatewayError::Unavailable {
        status: 503,
        message: "Service Unavailable".to_string(),
    }
}

#[async_trait]
impl BackendGateway for RecordingGateway {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((method, path.to_string(), body));
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut script = self.script.lock().unwrap();
        script
            .iter_mut()
            .find(|(p, _)| p == path)
            .and_then(|(_, queue)| queue.pop_front())
            .unwrap_or(Ok(Value::Null))
    }

    async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        self.request(method, path, body).await
    }
}
