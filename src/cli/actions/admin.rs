//! Admin user management. The email allow-list only gates the client; the
//! backend enforces authorization on every call.

use crate::{
    cli::{
        actions::context::{print_json, Session},
        globals::GlobalArgs,
    },
    gateway::{
        client,
        types::{AdminUser, AdminUserUpdate, Plan},
    },
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Debug)]
pub struct ListArgs {
    pub globals: GlobalArgs,
    pub search: Option<String>,
}

#[derive(Debug)]
pub struct UpdateArgs {
    pub globals: GlobalArgs,
    pub uid: String,
    pub update: AdminUserUpdate,
}

#[derive(Debug)]
pub struct DeleteArgs {
    pub globals: GlobalArgs,
    pub uid: String,
    pub confirmed: bool,
}

/// Maps a `--preset` value onto the update it sends.
///
/// # Errors
/// Returns an error for unknown presets.
pub fn parse_preset(preset: &str) -> Result<AdminUserUpdate> {
    let update = match preset {
        "activate-basic" => AdminUserUpdate::activate(Plan::Basic),
        "activate-pro" => AdminUserUpdate::activate(Plan::Pro),
        "activate-elite" => AdminUserUpdate::activate(Plan::Elite),
        "plan-basic" => AdminUserUpdate::plan_only(Plan::Basic),
        "plan-pro" => AdminUserUpdate::plan_only(Plan::Pro),
        "plan-elite" => AdminUserUpdate::plan_only(Plan::Elite),
        "trial" => AdminUserUpdate::trial(),
        "suspend" => AdminUserUpdate::suspend(),
        other => return Err(anyhow!("unknown preset: {other}")),
    };
    Ok(update)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRow<'a> {
    #[serde(flatten)]
    user: &'a AdminUser,
    plan_label: &'static str,
    status_label: &'static str,
}

impl<'a> From<&'a AdminUser> for UserRow<'a> {
    fn from(user: &'a AdminUser) -> Self {
        Self {
            user,
            plan_label: user.plan_label(),
            status_label: user.status_label(),
        }
    }
}

async fn open_admin(globals: &GlobalArgs) -> Result<Session> {
    let session = Session::open(globals).await?;
    if let Err(err) = session.require_admin() {
        session.close();
        return Err(err);
    }
    Ok(session)
}

/// # Errors
/// Returns an error if the account is not an admin or the backend call fails.
pub async fn list(args: ListArgs) -> Result<()> {
    let session = open_admin(&args.globals).await?;
    let result = client::list_admin_users(session.gateway.as_ref())
        .await
        .context("Failed to load users");
    session.close();
    let users = result?;

    let query = args.search.unwrap_or_default();
    let rows: Vec<UserRow<'_>> = client::filter_admin_users(&users, &query)
        .into_iter()
        .map(UserRow::from)
        .collect();
    print_json(&rows)
}

/// # Errors
/// Returns an error if the account is not an admin or the backend call fails.
pub async fn update(args: UpdateArgs) -> Result<()> {
    let session = open_admin(&args.globals).await?;
    let result = client::update_admin_user(session.gateway.as_ref(), &args.uid, &args.update)
        .await
        .context("Failed to update user");
    session.close();
    result?;

    info!(uid = %args.uid, "user updated");
    print_json(&json!({ "uid": args.uid, "updated": args.update }))
}

/// # Errors
/// Returns an error if the deletion is unconfirmed, the account is not an
/// admin, or the backend call fails.
pub async fn delete(args: DeleteArgs) -> Result<()> {
    if !args.confirmed {
        return Err(anyhow!("Refusing to delete {} without --yes", args.uid));
    }
    let session = open_admin(&args.globals).await?;
    let result = client::delete_admin_user(session.gateway.as_ref(), &args.uid)
        .await
        .context("Failed to delete user");
    session.close();
    result?;

    info!(uid = %args.uid, "user deleted");
    print_json(&json!({ "uid": args.uid, "deleted": true }))
}
