//! REST identity provider speaking the Identity Toolkit protocol
//! (`accounts:signInWithPassword`, `accounts:signUp`, `accounts:update`,
//! `accounts:lookup`) plus the secure token refresh endpoint.
//!
//! The signed-in user (never the short-lived id token) is persisted in the
//! local store so a later process restores it, which mirrors the browser's
//! local persistence. Social sign-in needs a browser popup and is reported as
//! unsupported here.

use super::{
    AuthMethod, CredentialError, Identity, IdentityError, IdentityEvents, IdentityProvider,
    IdentitySubscription,
};
use crate::{storage::KeyValueStore, APP_USER_AGENT};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

/// Store key holding the persisted signed-in user.
pub const IDENTITY_KEY: &str = "afp_identity";

/// Refresh tokens this long before the provider-reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct RestIdentityConfig {
    pub api_key: String,
    pub identity_url: String,
    pub token_url: String,
}

struct SignedIn {
    identity: Identity,
    refresh_token: SecretString,
    id_token: Option<(SecretString, Instant)>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedUser {
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
    methods: Vec<AuthMethod>,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenGrant {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderInfo>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInfo {
    provider_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    #[serde(default)]
    provider_user_info: Vec<ProviderInfo>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

pub struct RestIdentityProvider {
    client: Client,
    config: RestIdentityConfig,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<Option<SignedIn>>,
    events: IdentityEvents,
}

impl std::fmt::Debug for RestIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestIdentityProvider")
            .field("identity_url", &self.config.identity_url)
            .field("token_url", &self.config.token_url)
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

impl RestIdentityProvider {
    /// Builds the provider and restores a previously persisted user.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: RestIdentityConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| IdentityError::Transport(err.to_string()))?;

        let restored = restore_user(store.as_ref());
        if let Some(user) = &restored {
            debug!(uid = %user.identity.uid, "restored persisted identity");
        }

        Ok(Self {
            client,
            config,
            store,
            state: Mutex::new(restored),
            events: IdentityEvents::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<SignedIn>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accounts_url(&self, operation: &str) -> Result<Url, IdentityError> {
        endpoint_url(&self.config.identity_url, &format!("accounts:{operation}"), &self.config.api_key)
    }

    async fn post_accounts<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &Value,
    ) -> Result<T, IdentityError> {
        let url = self.accounts_url(operation)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| IdentityError::Transport(err.to_string()))?;

        decode_response(response).await
    }

    /// Installs a new signed-in user, persists it and notifies subscribers.
    fn establish(&self, identity: Identity, refresh_token: SecretString, id_token: SecretString, expires_in: Option<&str>) {
        let expires_at = Instant::now() + token_lifetime(expires_in);
        persist_user(self.store.as_ref(), &identity, &refresh_token);
        *self.lock() = Some(SignedIn {
            identity: identity.clone(),
            refresh_token,
            id_token: Some((id_token, expires_at)),
        });
        self.events.emit(&Some(identity));
    }

    async fn lookup_methods(&self, id_token: &SecretString) -> Vec<AuthMethod> {
        let body = json!({ "idToken": id_token.expose_secret() });
        match self.post_accounts::<LookupResponse>("lookup", &body).await {
            Ok(response) => response
                .users
                .first()
                .map(|user| methods_from(&user.provider_user_info))
                .filter(|methods| !methods.is_empty())
                .unwrap_or_else(|| vec![AuthMethod::Password]),
            Err(err) => {
                warn!("provider method lookup failed: {err}");
                vec![AuthMethod::Password]
            }
        }
    }

    /// Applies an `accounts:update` call for the signed-in user.
    async fn update_account(&self, mut body: Value) -> Result<(), IdentityError> {
        let token = self.current_bearer_token().await?;
        body["idToken"] = Value::String(token.expose_secret().to_string());
        body["returnSecureToken"] = Value::Bool(true);

        let response: UpdateResponse = self.post_accounts("update", &body).await?;

        let updated = {
            let mut state = self.lock();
            let Some(signed_in) = state.as_mut() else {
                return Err(IdentityError::Unauthenticated);
            };
            if response.email.is_some() {
                signed_in.identity.email = response.email;
            }
            if response.display_name.is_some() {
                signed_in.identity.display_name = response.display_name;
            }
            let methods = methods_from(&response.provider_user_info);
            if !methods.is_empty() {
                signed_in.identity.methods = methods;
            }
            if let Some(refresh_token) = response.refresh_token {
                signed_in.refresh_token = SecretString::from(refresh_token);
            }
            if let Some(id_token) = response.id_token {
                let expires_at = Instant::now() + token_lifetime(response.expires_in.as_deref());
                signed_in.id_token = Some((SecretString::from(id_token), expires_at));
            }
            (signed_in.identity.clone(), signed_in.refresh_token.clone())
        };

        persist_user(self.store.as_ref(), &updated.0, &updated.1);
        Ok(())
    }

    async fn refresh_id_token(&self, refresh_token: SecretString) -> Result<SecretString, IdentityError> {
        let url = endpoint_url(&self.config.token_url, "token", &self.config.api_key)?;
        let response = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|err| IdentityError::Transport(err.to_string()))?;

        let refreshed: RefreshResponse = decode_response(response).await?;
        let id_token = SecretString::from(refreshed.id_token);
        let expires_at = Instant::now() + token_lifetime(refreshed.expires_in.as_deref());

        let persisted = {
            let mut state = self.lock();
            let Some(signed_in) = state.as_mut() else {
                return Err(IdentityError::Unauthenticated);
            };
            signed_in.refresh_token = SecretString::from(refreshed.refresh_token);
            signed_in.id_token = Some((id_token.clone(), expires_at));
            (signed_in.identity.clone(), signed_in.refresh_token.clone())
        };
        persist_user(self.store.as_ref(), &persisted.0, &persisted.1);

        Ok(id_token)
    }

    async fn password_grant(&self, operation: &str, email: &str, password: &SecretString) -> Result<TokenGrant, IdentityError> {
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        self.post_accounts(operation, &body).await
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, IdentityError> {
        let grant = self.password_grant("signInWithPassword", email, password).await?;
        let id_token = SecretString::from(grant.id_token);
        let methods = self.lookup_methods(&id_token).await;

        let identity = Identity {
            uid: grant.local_id,
            display_name: grant.display_name.filter(|name| !name.is_empty()),
            email: grant.email,
            methods,
        };
        self.establish(
            identity.clone(),
            SecretString::from(grant.refresh_token),
            id_token,
            grant.expires_in.as_deref(),
        );
        Ok(identity)
    }

    async fn sign_in_with_social(&self) -> Result<Identity, IdentityError> {
        Err(IdentityError::Unsupported(
            "social sign-in requires an interactive browser".to_string(),
        ))
    }

    #[instrument(skip(self, password))]
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        let grant = self.password_grant("signUp", email, password).await?;
        let id_token = SecretString::from(grant.id_token);
        let mut display = grant.display_name.filter(|name| !name.is_empty());

        if let Some(name) = display_name.map(str::trim).filter(|name| !name.is_empty()) {
            let body = json!({
                "idToken": id_token.expose_secret(),
                "displayName": name,
            });
            let _: Value = self.post_accounts("update", &body).await?;
            display = Some(name.to_string());
        }

        let identity = Identity {
            uid: grant.local_id,
            display_name: display,
            email: grant.email,
            methods: vec![AuthMethod::Password],
        };
        self.establish(
            identity.clone(),
            SecretString::from(grant.refresh_token),
            id_token,
            grant.expires_in.as_deref(),
        );
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let was_signed_in = self.lock().take().is_some();
        self.store
            .remove(IDENTITY_KEY)
            .map_err(|err| IdentityError::Provider(err.to_string()))?;
        if was_signed_in {
            self.events.emit(&None);
        }
        Ok(())
    }

    fn subscribe(&self) -> IdentitySubscription {
        self.events.subscribe(self.current_identity())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.lock().as_ref().map(|signed_in| signed_in.identity.clone())
    }

    async fn reauthenticate_with_password(
        &self,
        current_password: &SecretString,
    ) -> Result<(), IdentityError> {
        let identity = self.current_identity().ok_or(IdentityError::Unauthenticated)?;
        let email = identity.email.unwrap_or_default();
        let grant = self
            .password_grant("signInWithPassword", &email, current_password)
            .await?;

        if grant.local_id != identity.uid {
            return Err(IdentityError::Provider(
                "re-authentication returned a different user".to_string(),
            ));
        }

        let expires_at = Instant::now() + token_lifetime(grant.expires_in.as_deref());
        let mut state = self.lock();
        if let Some(signed_in) = state.as_mut() {
            signed_in.refresh_token = SecretString::from(grant.refresh_token);
            signed_in.id_token = Some((SecretString::from(grant.id_token), expires_at));
        }
        Ok(())
    }

    async fn reauthenticate_with_social(&self) -> Result<(), IdentityError> {
        Err(IdentityError::Unsupported(
            "social re-authentication requires an interactive browser".to_string(),
        ))
    }

    async fn update_email(&self, new_email: &str) -> Result<(), IdentityError> {
        self.update_account(json!({ "email": new_email })).await
    }

    async fn update_password(&self, new_password: &SecretString) -> Result<(), IdentityError> {
        self.update_account(json!({ "password": new_password.expose_secret() }))
            .await
    }

    async fn update_display_name(&self, name: &str) -> Result<(), IdentityError> {
        self.update_account(json!({ "displayName": name })).await
    }

    async fn current_bearer_token(&self) -> Result<SecretString, IdentityError> {
        let refresh_token = {
            let state = self.lock();
            let signed_in = state.as_ref().ok_or(IdentityError::Unauthenticated)?;
            if let Some((token, expires_at)) = &signed_in.id_token {
                if Instant::now() + TOKEN_REFRESH_MARGIN < *expires_at {
                    return Ok(token.clone());
                }
            }
            signed_in.refresh_token.clone()
        };

        self.refresh_id_token(refresh_token).await
    }
}

fn restore_user(store: &dyn KeyValueStore) -> Option<SignedIn> {
    let raw = store.get(IDENTITY_KEY)?;
    match serde_json::from_str::<PersistedUser>(&raw) {
        Ok(user) => Some(SignedIn {
            identity: Identity {
                uid: user.uid,
                display_name: user.display_name,
                email: user.email,
                methods: user.methods,
            },
            refresh_token: SecretString::from(user.refresh_token),
            id_token: None,
        }),
        Err(err) => {
            warn!("ignoring unreadable persisted identity: {err}");
            None
        }
    }
}

fn persist_user(store: &dyn KeyValueStore, identity: &Identity, refresh_token: &SecretString) {
    let user = PersistedUser {
        uid: identity.uid.clone(),
        email: identity.email.clone(),
        display_name: identity.display_name.clone(),
        methods: identity.methods.clone(),
        refresh_token: refresh_token.expose_secret().to_string(),
    };
    let result = serde_json::to_string(&user)
        .map_err(|err| err.to_string())
        .and_then(|raw| store.set(IDENTITY_KEY, &raw).map_err(|err| err.to_string()));
    if let Err(err) = result {
        warn!("failed to persist identity: {err}");
    }
}

fn methods_from(infos: &[ProviderInfo]) -> Vec<AuthMethod> {
    let mut methods = Vec::new();
    for method in infos
        .iter()
        .filter_map(|info| AuthMethod::from_provider_id(&info.provider_id))
    {
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    methods
}

fn token_lifetime(expires_in: Option<&str>) -> Duration {
    expires_in
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map_or(Duration::from_secs(3600), Duration::from_secs)
}

fn endpoint_url(base: &str, path: &str, api_key: &str) -> Result<Url, IdentityError> {
    let base = base.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/{path}"))
        .map_err(|err| IdentityError::Provider(format!("invalid identity endpoint: {err}")))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, IdentityError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| IdentityError::Transport(err.to_string()))?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|err| IdentityError::Provider(format!("unexpected response: {err}")));
    }

    let code = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.to_string());

    Err(map_error_code(&code))
}

/// Maps provider error codes such as `EMAIL_EXISTS` or
/// `WEAK_PASSWORD : Password should be at least 6 characters`.
fn map_error_code(message: &str) -> IdentityError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => CredentialError::EmailInUse.into(),
        "INVALID_EMAIL" => CredentialError::InvalidEmail.into(),
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => CredentialError::WrongPassword.into(),
        "WEAK_PASSWORD" => CredentialError::WeakPassword.into(),
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => CredentialError::UserNotFound.into(),
        "USER_DISABLED" => CredentialError::UserDisabled.into(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => CredentialError::TooManyAttempts.into(),
        "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" => IdentityError::RecentLoginRequired,
        "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" => IdentityError::Unauthenticated,
        _ => IdentityError::Provider(message.to_string()),
    }
}
