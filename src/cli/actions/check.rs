use crate::policy::{Backend, BypassConfig, BypassPolicy, BypassReason, Decision, UserContext};
use anyhow::Result;
use std::net::IpAddr;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub user: String,
    pub backend: String,
    pub source_ip: String,
    pub bypass: BypassConfig,
}

/// Evaluate the bypass rules for one login; a blank backend or an unparsable source
/// address requires the second factor.
#[must_use]
pub fn evaluate(args: &Args) -> Decision {
    let Some(backend) = Backend::from_class_name(&args.backend) else {
        warn!(user = %args.user, "blank backend class name");
        return Decision::Require;
    };

    let policy = BypassPolicy::from_config(&args.bypass);
    let user = UserContext::new(args.user.trim(), backend);

    match args.source_ip.trim().parse::<IpAddr>() {
        Ok(ip) => policy.decide(&user, ip),
        Err(_) => {
            warn!(source_ip = %args.source_ip, "unparsable source address");
            Decision::Require
        }
    }
}

fn describe(decision: &Decision) -> String {
    match decision {
        Decision::Require => "second factor required".to_string(),
        Decision::Bypass(BypassReason::NonLdapBackend) => {
            "second factor skipped: ldap bypass enabled and account is not LDAP-backed".to_string()
        }
        Decision::Bypass(BypassReason::SourceAddress(range)) => {
            format!("second factor skipped: source address inside {range}")
        }
    }
}

/// Execute the check action.
/// # Errors
/// Never fails once arguments are parsed; kept fallible to match the other actions.
pub fn execute(args: &Args) -> Result<()> {
    let decision = evaluate(args);

    println!("{}: {}", args.user, describe(&decision));

    Ok(())
}
