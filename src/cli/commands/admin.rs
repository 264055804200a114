use clap::{builder::PossibleValuesParser, Arg, ArgAction, Command};

pub const CMD_ADMIN: &str = "admin";
pub const CMD_USERS: &str = "users";
pub const CMD_UPDATE: &str = "update";
pub const CMD_DELETE: &str = "delete";

pub const ARG_SEARCH: &str = "search";
pub const ARG_UID: &str = "uid";
pub const ARG_PRESET: &str = "preset";
pub const ARG_YES: &str = "yes";

pub const PRESETS: [&str; 8] = [
    "activate-basic",
    "activate-pro",
    "activate-elite",
    "plan-basic",
    "plan-pro",
    "plan-elite",
    "trial",
    "suspend",
];

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command.subcommand(
        Command::new(CMD_ADMIN)
            .about("Manage platform users (admin accounts only)")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(
                Command::new(CMD_USERS).about("List users").arg(
                    Arg::new(ARG_SEARCH)
                        .long(ARG_SEARCH)
                        .short('s')
                        .help("Filter by email, name or referral code"),
                ),
            )
            .subcommand(
                Command::new(CMD_UPDATE)
                    .about("Change a user's plan or status")
                    .arg(Arg::new(ARG_UID).help("User id").required(true))
                    .arg(
                        Arg::new(ARG_PRESET)
                            .long(ARG_PRESET)
                            .help("Change to apply")
                            .required(true)
                            .value_parser(PossibleValuesParser::new(PRESETS)),
                    ),
            )
            .subcommand(
                Command::new(CMD_DELETE)
                    .about("Delete a user")
                    .arg(Arg::new(ARG_UID).help("User id").required(true))
                    .arg(
                        Arg::new(ARG_YES)
                            .long(ARG_YES)
                            .help("Confirm the deletion")
                            .action(ArgAction::SetTrue),
                    ),
            ),
    )
}
