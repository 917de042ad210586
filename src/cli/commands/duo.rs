use crate::config::{
    DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_SERVICE_TIMEOUT_SECS, MAX_SERVICE_TIMEOUT_SECS,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_IKEY: &str = "ikey";
pub const ARG_SKEY: &str = "skey";
pub const ARG_AKEY: &str = "akey";
pub const ARG_HOST: &str = "host";
pub const ARG_CHALLENGE_TTL: &str = "challenge-ttl";
pub const ARG_SERVICE_TIMEOUT: &str = "service-timeout";

/// Integration keys and service settings as given on the command line.
#[derive(Debug)]
pub struct Options {
    pub ikey: String,
    pub skey: SecretString,
    pub akey: SecretString,
    pub host: String,
    pub challenge_ttl: u64,
    pub service_timeout: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .with_context(|| format!("missing required argument: --{id}"))
        };

        Ok(Self {
            ikey: required(ARG_IKEY)?,
            skey: SecretString::from(required(ARG_SKEY)?),
            akey: SecretString::from(required(ARG_AKEY)?),
            host: required(ARG_HOST)?,
            challenge_ttl: matches
                .get_one::<u64>(ARG_CHALLENGE_TTL)
                .copied()
                .unwrap_or(DEFAULT_CHALLENGE_TTL_SECS),
            service_timeout: matches
                .get_one::<u64>(ARG_SERVICE_TIMEOUT)
                .copied()
                .unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IKEY)
                .long("ikey")
                .help("Integration key (20 alphanumeric characters)")
                .env("DUOGATE_IKEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SKEY)
                .long("skey")
                .help("Secret key shared with the verification service (40 characters)")
                .env("DUOGATE_SKEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_AKEY)
                .long("akey")
                .help("Application key used to sign challenges (at least 40 characters)")
                .env("DUOGATE_AKEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_HOST)
                .long("host")
                .help("Verification service API host, e.g. api-XXXXXXXX.duosecurity.com")
                .env("DUOGATE_HOST")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TTL)
                .long("challenge-ttl")
                .help("Seconds a challenge stays valid")
                .env("DUOGATE_CHALLENGE_TTL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SERVICE_TIMEOUT)
                .long("service-timeout")
                .help("Seconds to wait for the verification service")
                .env("DUOGATE_SERVICE_TIMEOUT")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_SERVICE_TIMEOUT_SECS)),
        )
}
