use crate::cli::actions::{check, server, Action};
use crate::cli::commands::{bypass, duo, CMD_CHECK, CMD_SERVER};
use crate::config::{Config, DuoKeys};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or the configuration is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_SERVER, sub_m)) => {
            let port = sub_m.get_one::<u16>("port").copied().unwrap_or(8080);
            let options = duo::Options::parse(sub_m)?;
            let bypass = bypass::parse(sub_m);

            let keys = DuoKeys::new(options.ikey, options.skey, options.akey)
                .context("invalid integration keys")?;
            let config = Config::new(
                keys,
                &options.host,
                bypass,
                options.challenge_ttl,
                options.service_timeout,
            )
            .context("invalid configuration")?;

            Ok(Action::Server(server::Args { port, config }))
        }
        Some((CMD_CHECK, sub_m)) => {
            let required = |id: &str| -> Result<String> {
                sub_m
                    .get_one::<String>(id)
                    .cloned()
                    .with_context(|| format!("missing required argument: --{id}"))
            };

            let bypass = bypass::parse(sub_m);
            bypass.validate().context("invalid bypass configuration")?;

            Ok(Action::Check(check::Args {
                user: required("user")?,
                backend: required("backend")?,
                source_ip: required("source-ip")?,
                bypass,
            }))
        }
        _ => Err(anyhow!("unknown subcommand")),
    }
}
