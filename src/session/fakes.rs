//! In-process fakes for the session unit tests.
#![allow(clippy::unwrap_used)]

use crate::{
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
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

pub(crate) fn identity(uid: &str, methods: &[AuthMethod]) -> Identity {
    Identity {
        uid: uid.to_string(),
        display_name: Some(format!("User {uid}")),
        email: Some(format!("{uid}@example.com")),
        methods: methods.to_vec(),
    }
}

pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    pub events: IdentityEvents,
    current: Mutex<Option<Identity>>,
    password: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, IdentityError>>,
}

impl FakeProvider {
    pub fn signed_in(identity: Identity, password: &str) -> Self {
        let provider = Self::default();
        *provider.current.lock().unwrap() = Some(identity);
        *provider.password.lock().unwrap() = Some(password.to_string());
        provider
    }

    pub fn fail(&self, operation: &'static str, err: IdentityError) {
        self.failures.lock().unwrap().insert(operation, err);
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

    pub fn set_identity(&self, identity: Option<Identity>) {
        self.current.lock().unwrap().clone_from(&identity);
        self.events.emit(&identity);
    }

    fn record(&self, call: String, operation: &'static str) -> Result<(), IdentityError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn signed_in_as(&self, email: &str, name: Option<&str>) -> Identity {
        let uid = email.split('@').next().unwrap_or("user").to_string();
        let identity = Identity {
            uid,
            display_name: name.map(str::to_string),
            email: Some(email.to_string()),
            methods: vec![AuthMethod::Password],
        };
        self.set_identity(Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, IdentityError> {
        self.record(format!("sign_in_with_password:{email}"), "sign_in_with_password")?;
        *self.password.lock().unwrap() = Some(password.expose_secret().to_string());
        Ok(self.signed_in_as(email, None))
    }

    async fn sign_in_with_social(&self) -> Result<Identity, IdentityError> {
        self.record("sign_in_with_social".to_string(), "sign_in_with_social")?;
        let identity = identity("social", &[AuthMethod::Social]);
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        self.record(format!("sign_up_with_password:{email}"), "sign_up_with_password")?;
        *self.password.lock().unwrap() = Some(password.expose_secret().to_string());
        Ok(self.signed_in_as(email, display_name))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.record("sign_out".to_string(), "sign_out")?;
        self.set_identity(None);
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
        self.record(
            "reauthenticate_with_password".to_string(),
            "reauthenticate_with_password",
        )?;
        let expected = self.password.lock().unwrap().clone();
        if expected.as_deref() == Some(current_password.expose_secret()) {
            Ok(())
        } else {
            Err(CredentialError::WrongPassword.into())
        }
    }

    async fn reauthenticate_with_social(&self) -> Result<(), IdentityError> {
        self.record(
            "reauthenticate_with_social".to_string(),
            "reauthenticate_with_social",
        )
    }

    async fn update_email(&self, new_email: &str) -> Result<(), IdentityError> {
        self.record(format!("update_email:{new_email}"), "update_email")?;
        if let Some(identity) = self.current.lock().unwrap().as_mut() {
            identity.email = Some(new_email.to_string());
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &SecretString) -> Result<(), IdentityError> {
        self.record("update_password".to_string(), "update_password")?;
        *self.password.lock().unwrap() = Some(new_password.expose_secret().to_string());
        Ok(())
    }

    async fn update_display_name(&self, name: &str) -> Result<(), IdentityError> {
        self.record(format!("update_display_name:{name}"), "update_display_name")?;
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

pub(crate) type Call = (Method, String, Option<Value>);

/// Gateway that records calls and replays scripted outcomes, `Ok(Null)` once
/// the script runs out.
#[derive(Default)]
pub(crate) struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Result<Value, GatewayError>>>,
    latency: Mutex<Option<Duration>>,
}

impl FakeGateway {
    pub fn push(&self, outcome: Result<Value, GatewayError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls().iter().filter(|(_, p, _)| p == path).count()
    }
}

pub(crate) fn unavailable() -> GatewayError {
    GatewayError::Unavailable {
        status: 503,
        message: "Service Unavailable".to_string(),
    }
}

#[async_trait]
impl BackendGateway for FakeGateway {
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
        let outcome = self.script.lock().unwrap().pop_front();
        outcome.unwrap_or(Ok(Value::Null))
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
