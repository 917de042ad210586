//! # duogate
//!
//! Second-factor decision module for a login flow backed by the Duo verification service.
//!
//! Two questions are answered for every login:
//!
//! 1. **Does this login need the second factor?** [`policy::BypassPolicy`] evaluates the
//!    configured bypass rules (LDAP flag, trusted CIDR ranges) against the user and the
//!    source address. Anything unknown or malformed requires the second factor.
//! 2. **Did the user complete it?** [`challenge::ChallengeVerifier`] issues a signed,
//!    short-lived `TX` token for the prompt and accepts only a genuine, unexpired `AUTH`
//!    token signed for the same user and integration.
//!
//! [`provider::Provider`] combines both with a reachability check against the verification
//! service ([`service::ServiceClient`]); the `duogate` binary exposes it over HTTP.

pub mod challenge;
pub mod cli;
pub mod config;
pub mod duogate;
pub mod policy;
pub mod provider;
pub mod service;

#[cfg(test)]
mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
