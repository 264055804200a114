use crate::{
    cli::{
        actions::context::{account_error, print_json, Session},
        globals::GlobalArgs,
    },
    identity::{AuthMethod, Identity},
    session::SignUp,
};
use anyhow::Result;
use secrecy::SecretString;
use serde::Serialize;
use tracing::info;

#[derive(Debug)]
pub struct SignInArgs {
    pub globals: GlobalArgs,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    pub social: bool,
}

#[derive(Debug)]
pub struct SignUpArgs {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
    pub full_name: Option<String>,
    pub referrer_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub signed_in: bool,
    pub uid: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub methods: Vec<AuthMethod>,
    pub session_started_at: Option<i64>,
    pub session_remaining_seconds: Option<u64>,
    pub provisioned: bool,
    pub admin: bool,
}

impl StatusReport {
    fn signed_out() -> Self {
        Self {
            signed_in: false,
            uid: None,
            email: None,
            display_name: None,
            methods: Vec::new(),
            session_started_at: None,
            session_remaining_seconds: None,
            provisioned: false,
            admin: false,
        }
    }

    fn from_session(session: &Session, identity: Identity) -> Self {
        let policy = session.store.policy();
        Self {
            signed_in: true,
            provisioned: session.store.provisioning().is_provisioned(&identity.uid),
            admin: session.config.is_admin_email(identity.email.as_deref()),
            session_started_at: policy.started_at(),
            session_remaining_seconds: policy.remaining().map(|left| left.as_secs()),
            uid: Some(identity.uid),
            email: identity.email,
            display_name: identity.display_name,
            methods: identity.methods,
        }
    }
}

/// # Errors
/// Returns an error if the credentials are rejected or provisioning failed.
pub async fn sign_in(args: SignInArgs) -> Result<()> {
    let session = Session::open(&args.globals).await?;

    let result = if args.social {
        session.store.sign_in_with_social().await
    } else {
        let email = args.email.unwrap_or_default();
        let password = args.password.unwrap_or_default();
        session.store.sign_in(&email, &password).await
    };

    let report = result
        .map(|identity| {
            info!(uid = %identity.uid, "signed in");
            StatusReport::from_session(&session, identity)
        })
        .map_err(account_error);
    session.close();
    print_json(&report?)
}

/// # Errors
/// Returns an error if the account cannot be created or provisioning failed.
pub async fn sign_up(args: SignUpArgs) -> Result<()> {
    let session = Session::open(&args.globals).await?;

    let sign_up = SignUp {
        email: args.email,
        password: args.password,
        full_name: args.full_name,
        referrer_code: args.referrer_code,
    };
    let report = session
        .store
        .sign_up(&sign_up)
        .await
        .map(|identity| {
            info!(uid = %identity.uid, "account created");
            StatusReport::from_session(&session, identity)
        })
        .map_err(account_error);
    session.close();
    print_json(&report?)
}

/// # Errors
/// Returns an error if the provider could not sign out.
pub async fn sign_out(globals: &GlobalArgs) -> Result<()> {
    let session = Session::open(globals).await?;
    let result = session.store.sign_out().await.map_err(account_error);
    session.close();
    result?;
    print_json(&StatusReport::signed_out())
}

/// # Errors
/// Returns an error if the session cannot be opened.
pub async fn status(globals: &GlobalArgs) -> Result<()> {
    let session = Session::open(globals).await?;
    let report = match session.state().identity {
        Some(identity) => StatusReport::from_session(&session, identity),
        None => StatusReport::signed_out(),
    };
    session.close();
    print_json(&report)
}
