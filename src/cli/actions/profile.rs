use crate::{
    cli::{
        actions::context::{account_error, print_json, Session},
        globals::GlobalArgs,
    },
    session::{PasswordChange, ProfileChange, ProfileUpdate},
};
use anyhow::Result;
use secrecy::SecretString;
use serde_json::json;

#[derive(Debug)]
pub struct ProfileArgs {
    pub globals: GlobalArgs,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<SecretString>,
}

#[derive(Debug)]
pub struct PasswordArgs {
    pub globals: GlobalArgs,
    pub current_password: Option<SecretString>,
    pub new_password: SecretString,
    pub confirmation: SecretString,
}

/// # Errors
/// Returns an error if nobody is signed in, re-authentication fails, or the
/// backend could not be updated.
pub async fn update(args: ProfileArgs) -> Result<()> {
    let session = Session::open(&args.globals).await?;
    if let Err(err) = session.require_identity() {
        session.close();
        return Err(err);
    }

    let update = ProfileUpdate {
        full_name: args.full_name,
        email: args.email,
        current_password: args.current_password,
    };
    let result = session.store.account().update_profile(&update).await;
    session.close();

    match result.map_err(account_error)? {
        ProfileChange::Unchanged => print_json(&json!({ "changed": false })),
        ProfileChange::Updated {
            full_name,
            email,
            name_changed,
            email_changed,
        } => print_json(&json!({
            "changed": true,
            "fullName": full_name,
            "email": email,
            "nameChanged": name_changed,
            "emailChanged": email_changed,
        })),
    }
}

/// # Errors
/// Returns an error if validation or re-authentication fails.
pub async fn change_password(args: PasswordArgs) -> Result<()> {
    let session = Session::open(&args.globals).await?;
    if let Err(err) = session.require_identity() {
        session.close();
        return Err(err);
    }

    let change = PasswordChange {
        current_password: args.current_password,
        new_password: args.new_password,
        confirmation: args.confirmation,
    };
    let result = session.store.account().change_password(&change).await;
    session.close();

    result.map_err(account_error)?;
    print_json(&json!({ "passwordChanged": true }))
}
