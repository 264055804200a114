//! Global `-v` flag. Each repetition raises the log level one step; the
//! `AFP_LOG_LEVEL` variable sets it by name or by step instead.

use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names, indexed by verbosity step.
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    LOG_LEVELS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .or_else(|| level.parse::<usize>().ok().filter(|step| *step < LOG_LEVELS.len()))
        .and_then(|step| u8::try_from(step).ok())
        .ok_or_else(|| {
            format!(
                "invalid log level '{level}', expected a step 0-4 or one of: {}",
                LOG_LEVELS.join(", ")
            )
        })
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("AFP_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
