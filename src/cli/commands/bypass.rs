use crate::policy::BypassConfig;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_LDAP_BYPASS: &str = "ldap-bypass";
pub const ARG_IP_BYPASS: &str = "ip-bypass";

/// Bypass rules in the order they were given.
#[must_use]
pub fn parse(matches: &ArgMatches) -> BypassConfig {
    let ldap_bypass = matches
        .get_one::<bool>(ARG_LDAP_BYPASS)
        .copied()
        .unwrap_or(false);

    let ip_ranges = matches
        .get_many::<String>(ARG_IP_BYPASS)
        .map(|values| {
            values
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    BypassConfig::new(ldap_bypass, ip_ranges)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LDAP_BYPASS)
                .long("ldap-bypass")
                .help("Skip the second factor for every account that is not LDAP-backed")
                .env("DUOGATE_LDAP_BYPASS")
                .num_args(0..=1)
                .default_value("false")
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_IP_BYPASS)
                .long("ip-bypass")
                .help("Comma separated CIDR ranges whose source addresses skip the second factor")
                .env("DUOGATE_IP_BYPASS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}
