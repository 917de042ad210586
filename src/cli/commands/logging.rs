//! Log level selection: repeated `-v` flags, or a level name in `DUOGATE_LOG_LEVEL`.

use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Levels in verbosity order; the count of `-v` flags indexes into it.
const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

fn parse_level(value: &str) -> Result<u8, String> {
    let value = value.trim();

    let index = match value.parse::<usize>() {
        Ok(count) => Some(count).filter(|count| *count < LEVELS.len()),
        Err(_) => LEVELS
            .iter()
            .position(|level| level.as_str().eq_ignore_ascii_case(value)),
    };

    index
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level {value:?}, expected ERROR to TRACE or 0 to 4"))
}

/// Level the subscriber filters at when `RUST_LOG` is unset; more `-v` than levels
/// saturates at `TRACE`.
#[must_use]
pub fn level(matches: &ArgMatches) -> Level {
    let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);

    LEVELS[usize::from(count).min(LEVELS.len() - 1)]
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("DUOGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_level)),
    )
}
