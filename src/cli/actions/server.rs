use crate::{config::Config, duogate, provider::Provider};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub config: Config,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider can't be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let provider = Provider::new(args.config).context("Failed to build provider")?;

    duogate::new(args.port, Arc::new(provider)).await
}

// keys other than the integration key are never part of the output
fn log_startup_args(args: &Args) {
    let bypass = args.config.bypass();
    let ranges = if bypass.ip_ranges.is_empty() {
        "none".to_string()
    } else {
        bypass.ip_ranges.join(",")
    };

    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("host", args.config.service_url().to_string()),
        (
            "integration_key",
            args.config.keys().integration_key().to_string(),
        ),
        ("ldap_bypass", bypass.ldap_bypass.to_string()),
        ("ip_bypass", ranges),
        (
            "challenge_ttl",
            format!("{}s", args.config.challenge_ttl().as_secs()),
        ),
        (
            "service_timeout",
            format!("{}s", args.config.service_timeout().as_secs()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
