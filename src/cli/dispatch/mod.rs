//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to execute, carrying the shared
//! connection settings in [`GlobalArgs`].

use crate::cli::{
    actions::{admin, auth, profile, Action},
    commands::{account, admin as admin_cmd, backend},
    globals::GlobalArgs,
};
use crate::config::parse_admin_emails;
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn secret(matches: &ArgMatches, id: &str) -> Option<SecretString> {
    string(matches, id).map(SecretString::from)
}

fn required_secret(matches: &ArgMatches, id: &str) -> Result<SecretString> {
    secret(matches, id).with_context(|| format!("missing required argument: --{id}"))
}

/// # Errors
/// Returns an error if the backend URL or identity API key is missing.
pub fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let backend_url = string(matches, backend::ARG_BACKEND_URL)
        .filter(|url| !url.trim().is_empty())
        .context("missing required argument: --backend-url")?;
    let identity_api_key = secret(matches, backend::ARG_IDENTITY_API_KEY)
        .context("missing required argument: --identity-api-key")?;

    Ok(GlobalArgs {
        backend_url,
        identity_api_key,
        identity_url: string(matches, backend::ARG_IDENTITY_URL).unwrap_or_default(),
        token_url: string(matches, backend::ARG_TOKEN_URL).unwrap_or_default(),
        data_dir: string(matches, backend::ARG_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_default(),
        admin_emails: string(matches, backend::ARG_ADMIN_EMAILS)
            .map(|emails| parse_admin_emails(&emails))
            .unwrap_or_default(),
        session_hours: matches
            .get_one::<u64>(backend::ARG_SESSION_HOURS)
            .copied()
            .unwrap_or(crate::config::DEFAULT_SESSION_HOURS),
    })
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some((account::CMD_SIGNIN, sub)) => Ok(Action::SignIn(auth::SignInArgs {
            globals,
            email: string(sub, account::ARG_EMAIL),
            password: secret(sub, account::ARG_PASSWORD),
            social: sub.get_flag(account::ARG_SOCIAL),
        })),
        Some((account::CMD_SIGNUP, sub)) => Ok(Action::SignUp(auth::SignUpArgs {
            globals,
            email: string(sub, account::ARG_EMAIL)
                .context("missing required argument: --email")?,
            password: required_secret(sub, account::ARG_PASSWORD)?,
            full_name: string(sub, account::ARG_NAME),
            referrer_code: string(sub, account::ARG_REFERRER),
        })),
        Some((account::CMD_SIGNOUT, _)) => Ok(Action::SignOut(globals)),
        Some((account::CMD_STATUS, _)) => Ok(Action::Status(globals)),
        Some((account::CMD_PROFILE, sub)) => Ok(Action::Profile(profile::ProfileArgs {
            globals,
            full_name: string(sub, account::ARG_NAME),
            email: string(sub, account::ARG_EMAIL),
            current_password: secret(sub, account::ARG_CURRENT_PASSWORD),
        })),
        Some((account::CMD_PASSWORD, sub)) => Ok(Action::Password(profile::PasswordArgs {
            globals,
            current_password: secret(sub, account::ARG_CURRENT_PASSWORD),
            new_password: required_secret(sub, account::ARG_NEW_PASSWORD)?,
            confirmation: required_secret(sub, account::ARG_CONFIRM_PASSWORD)?,
        })),
        Some((account::CMD_TOOLS, _)) => Ok(Action::Tools(globals)),
        Some((admin_cmd::CMD_ADMIN, sub)) => admin_handler(sub, globals),
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}

fn admin_handler(matches: &ArgMatches, globals: GlobalArgs) -> Result<Action> {
    match matches.subcommand() {
        Some((admin_cmd::CMD_USERS, sub)) => Ok(Action::AdminUsers(admin::ListArgs {
            globals,
            search: string(sub, admin_cmd::ARG_SEARCH),
        })),
        Some((admin_cmd::CMD_UPDATE, sub)) => {
            let preset = string(sub, admin_cmd::ARG_PRESET)
                .context("missing required argument: --preset")?;
            Ok(Action::AdminUpdate(admin::UpdateArgs {
                globals,
                uid: string(sub, admin_cmd::ARG_UID).context("missing required argument: uid")?,
                update: admin::parse_preset(&preset)?,
            }))
        }
        Some((admin_cmd::CMD_DELETE, sub)) => Ok(Action::AdminDelete(admin::DeleteArgs {
            globals,
            uid: string(sub, admin_cmd::ARG_UID).context("missing required argument: uid")?,
            confirmed: sub.get_flag(admin_cmd::ARG_YES),
        })),
        _ => Err(anyhow!("missing admin command")),
    }
}
