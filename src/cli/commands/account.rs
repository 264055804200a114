use clap::{Arg, ArgAction, Command};

pub const CMD_SIGNIN: &str = "signin";
pub const CMD_SIGNUP: &str = "signup";
pub const CMD_SIGNOUT: &str = "signout";
pub const CMD_STATUS: &str = "status";
pub const CMD_PROFILE: &str = "profile";
pub const CMD_PASSWORD: &str = "password";
pub const CMD_TOOLS: &str = "tools";

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_SOCIAL: &str = "social";
pub const ARG_NAME: &str = "name";
pub const ARG_REFERRER: &str = "referrer";
pub const ARG_CURRENT_PASSWORD: &str = "current-password";
pub const ARG_NEW_PASSWORD: &str = "new";
pub const ARG_CONFIRM_PASSWORD: &str = "confirm";

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password")
        .env("AFP_PASSWORD")
        .hide_env_values(true)
}

fn current_password_arg() -> Arg {
    Arg::new(ARG_CURRENT_PASSWORD)
        .long(ARG_CURRENT_PASSWORD)
        .help("Current password, required to re-verify password accounts")
        .env("AFP_CURRENT_PASSWORD")
        .hide_env_values(true)
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_SIGNIN)
                .about("Sign in with email and password, or with the social provider")
                .arg(
                    Arg::new(ARG_EMAIL)
                        .long(ARG_EMAIL)
                        .help("Account email")
                        .required_unless_present(ARG_SOCIAL),
                )
                .arg(password_arg().required_unless_present(ARG_SOCIAL))
                .arg(
                    Arg::new(ARG_SOCIAL)
                        .long(ARG_SOCIAL)
                        .help("Use the social sign-in flow")
                        .action(ArgAction::SetTrue)
                        .conflicts_with(ARG_EMAIL),
                ),
        )
        .subcommand(
            Command::new(CMD_SIGNUP)
                .about("Create an account and provision it on the backend")
                .arg(
                    Arg::new(ARG_EMAIL)
                        .long(ARG_EMAIL)
                        .help("Account email")
                        .required(true),
                )
                .arg(password_arg().required(true))
                .arg(Arg::new(ARG_NAME).long(ARG_NAME).help("Full name"))
                .arg(
                    Arg::new(ARG_REFERRER)
                        .long(ARG_REFERRER)
                        .help("Referral code of the inviting affiliate"),
                ),
        )
        .subcommand(Command::new(CMD_SIGNOUT).about("Sign out and clear the local session"))
        .subcommand(Command::new(CMD_STATUS).about("Show the current session"))
        .subcommand(
            Command::new(CMD_PROFILE)
                .about("Update the display name and/or email")
                .arg(Arg::new(ARG_NAME).long(ARG_NAME).help("New full name"))
                .arg(Arg::new(ARG_EMAIL).long(ARG_EMAIL).help("New email"))
                .arg(current_password_arg()),
        )
        .subcommand(
            Command::new(CMD_PASSWORD)
                .about("Change the account password")
                .arg(current_password_arg().long("current"))
                .arg(
                    Arg::new(ARG_NEW_PASSWORD)
                        .long(ARG_NEW_PASSWORD)
                        .help("New password (at least 8 characters)")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CONFIRM_PASSWORD)
                        .long(ARG_CONFIRM_PASSWORD)
                        .help("New password again")
                        .required(true),
                ),
        )
        .subcommand(Command::new(CMD_TOOLS).about("List the tools available to the account"))
}
