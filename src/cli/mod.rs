pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

use anyhow::Result;

/// Parse the command line, set up logging, and resolve the action to run.
///
/// # Errors
/// Returns an error if telemetry can't be initialised or the configuration is invalid.
pub fn start() -> Result<actions::Action> {
    let matches = commands::new().get_matches();

    telemetry::init(commands::logging::level(&matches))?;

    dispatch::handler(&matches)
}
