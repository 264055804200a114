use crate::config::{DEFAULT_DATA_DIR, DEFAULT_IDENTITY_URL, DEFAULT_TOKEN_URL};
use clap::{Arg, Command};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_IDENTITY_API_KEY: &str = "identity-api-key";
pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_TOKEN_URL: &str = "token-url";
pub const ARG_DATA_DIR: &str = "data-dir";
pub const ARG_ADMIN_EMAILS: &str = "admin-emails";
pub const ARG_SESSION_HOURS: &str = "session-hours";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Backend API base URL, example: https://api.afiliados.pro")
                .env("AFP_BACKEND_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_API_KEY)
                .long(ARG_IDENTITY_API_KEY)
                .help("Identity provider API key")
                .env("AFP_IDENTITY_API_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Identity provider accounts endpoint")
                .env("AFP_IDENTITY_URL")
                .default_value(DEFAULT_IDENTITY_URL)
                .global(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_URL)
                .long(ARG_TOKEN_URL)
                .help("Identity provider token refresh endpoint")
                .env("AFP_TOKEN_URL")
                .default_value(DEFAULT_TOKEN_URL)
                .global(true),
        )
        .arg(
            Arg::new(ARG_DATA_DIR)
                .long(ARG_DATA_DIR)
                .help("Directory holding the local session store")
                .env("AFP_DATA_DIR")
                .default_value(DEFAULT_DATA_DIR)
                .global(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAILS)
                .long(ARG_ADMIN_EMAILS)
                .help("Comma-separated emails allowed to use the admin commands")
                .env("AFP_ADMIN_EMAILS")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SESSION_HOURS)
                .long(ARG_SESSION_HOURS)
                .help("Maximum session age in hours")
                .env("AFP_SESSION_HOURS")
                .default_value("24")
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
}
