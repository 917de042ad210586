//! Typed configuration, validated once when loaded.
//!
//! Everything downstream receives an already validated [`Config`]; nothing reads
//! configuration from process globals.

use crate::policy::{BypassConfig, CidrError};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const INTEGRATION_KEY_LEN: usize = 20;
pub const SECRET_KEY_LEN: usize = 40;
pub const MIN_APPLICATION_KEY_LEN: usize = 40;

pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 5;
pub const MAX_SERVICE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("integration key must be 20 ASCII alphanumeric characters")]
    InvalidIntegrationKey,
    #[error("secret key must be 40 characters")]
    InvalidSecretKey,
    #[error("application key must be at least 40 characters")]
    WeakApplicationKey,
    #[error("invalid service host: {0}")]
    InvalidHost(String),
    #[error("invalid bypass range {range:?}: {source}")]
    InvalidBypassRange { range: String, source: CidrError },
    #[error("challenge ttl must be greater than zero")]
    InvalidChallengeTtl,
    #[error("service timeout must be between 1 and 60 seconds")]
    InvalidServiceTimeout,
}

/// The three keys shared with the verification service.
///
/// Only constructible through [`DuoKeys::new`], so a held value always satisfies the
/// length requirements.
#[derive(Debug, Clone)]
pub struct DuoKeys {
    integration_key: String,
    secret_key: SecretString,
    application_key: SecretString,
}

impl DuoKeys {
    /// # Errors
    /// Returns an error if any key has the wrong shape or the application key is too short
    /// to produce a strong signature.
    pub fn new(
        integration_key: impl Into<String>,
        secret_key: SecretString,
        application_key: SecretString,
    ) -> Result<Self, ConfigError> {
        let integration_key = integration_key.into();

        if !valid_integration_key(&integration_key) {
            return Err(ConfigError::InvalidIntegrationKey);
        }

        if secret_key.expose_secret().chars().count() != SECRET_KEY_LEN {
            return Err(ConfigError::InvalidSecretKey);
        }

        if application_key.expose_secret().chars().count() < MIN_APPLICATION_KEY_LEN {
            return Err(ConfigError::WeakApplicationKey);
        }

        Ok(Self {
            integration_key,
            secret_key,
            application_key,
        })
    }

    #[must_use]
    pub fn integration_key(&self) -> &str {
        &self.integration_key
    }

    #[must_use]
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    #[must_use]
    pub fn application_key(&self) -> &SecretString {
        &self.application_key
    }
}

fn valid_integration_key(key: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9]{20}$").is_ok_and(|re| re.is_match(key))
}

/// Resolve the configured host to a base URL; a bare hostname means `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidHost`] for anything that is not an http(s) origin.
pub fn service_url(host: &str) -> Result<Url, ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::InvalidHost(host.to_string()));
    }

    let url = if host.contains("://") {
        Url::parse(host)
    } else {
        Url::parse(&format!("https://{host}"))
    }
    .map_err(|e| ConfigError::InvalidHost(format!("{host}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidHost(format!(
            "{host}: unsupported scheme {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidHost(format!("{host}: no host specified")));
    }

    if url.path() != "/" || url.query().is_some() {
        return Err(ConfigError::InvalidHost(format!(
            "{host}: must not contain a path or query"
        )));
    }

    Ok(url)
}

/// `host[:port]` of a service URL, the port only when it is not the scheme default.
#[must_use]
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|host| !host.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct Config {
    keys: DuoKeys,
    service_host: String,
    service_url: Url,
    bypass: BypassConfig,
    challenge_ttl: Duration,
    service_timeout: Duration,
}

impl Config {
    /// # Errors
    /// Returns the first validation failure; a configuration with a malformed bypass range
    /// is rejected as a whole.
    pub fn new(
        keys: DuoKeys,
        host: &str,
        bypass: BypassConfig,
        challenge_ttl_secs: u64,
        service_timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let service_url = service_url(host)?;
        let service_host = authority(&service_url).ok_or_else(|| {
            ConfigError::InvalidHost(format!("{}: no host specified", host.trim()))
        })?;

        bypass.validate()?;

        if challenge_ttl_secs == 0 {
            return Err(ConfigError::InvalidChallengeTtl);
        }

        if !(1..=MAX_SERVICE_TIMEOUT_SECS).contains(&service_timeout_secs) {
            return Err(ConfigError::InvalidServiceTimeout);
        }

        Ok(Self {
            keys,
            service_host,
            service_url,
            bypass,
            challenge_ttl: Duration::from_secs(challenge_ttl_secs),
            service_timeout: Duration::from_secs(service_timeout_secs),
        })
    }

    #[must_use]
    pub const fn keys(&self) -> &DuoKeys {
        &self.keys
    }

    /// Service `host[:port]` handed to the prompt, never the raw configured string.
    #[must_use]
    pub fn service_host(&self) -> &str {
        &self.service_host
    }

    #[must_use]
    pub const fn service_url(&self) -> &Url {
        &self.service_url
    }

    #[must_use]
    pub const fn bypass(&self) -> &BypassConfig {
        &self.bypass
    }

    #[must_use]
    pub const fn challenge_ttl(&self) -> Duration {
        self.challenge_ttl
    }

    #[must_use]
    pub const fn service_timeout(&self) -> Duration {
        self.service_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{keys, AKEY, IKEY, SKEY};

    #[test]
    fn test_keys_valid() {
        let keys = keys();
        assert_eq!(keys.integration_key(), IKEY);
        assert_eq!(keys.secret_key().expose_secret(), SKEY);
        assert_eq!(keys.application_key().expose_secret(), AKEY);
    }

    #[test]
    fn test_keys_are_not_printed() {
        let printed = format!("{:?}", keys());
        assert!(printed.contains(IKEY));
        assert!(!printed.contains(SKEY));
        assert!(!printed.contains(AKEY));
    }

    #[test]
    fn test_invalid_integration_key() {
        let invalid = [
            "",
            "DIXXXXXXXXXXXXXXXXX",
            "DIXXXXXXXXXXXXXXXXXXX",
            "DIXXXXXXXXXXXXXXXX:X",
        ];
        for ikey in invalid {
            let result = DuoKeys::new(
                ikey,
                SecretString::from(SKEY.to_string()),
                SecretString::from(AKEY.to_string()),
            );
            assert_eq!(result.unwrap_err(), ConfigError::InvalidIntegrationKey, "{ikey:?}");
        }
    }

    #[test]
    fn test_invalid_secret_key() {
        let result = DuoKeys::new(
            IKEY,
            SecretString::from("short".to_string()),
            SecretString::from(AKEY.to_string()),
        );
        assert_eq!(result.unwrap_err(), ConfigError::InvalidSecretKey);
    }

    #[test]
    fn test_weak_application_key() {
        let result = DuoKeys::new(
            IKEY,
            SecretString::from(SKEY.to_string()),
            SecretString::from("a".repeat(39)),
        );
        assert_eq!(result.unwrap_err(), ConfigError::WeakApplicationKey);

        let result = DuoKeys::new(
            IKEY,
            SecretString::from(SKEY.to_string()),
            SecretString::from("a".repeat(64)),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_service_url() {
        assert_eq!(
            service_url("api-xxxxxxxx.duosecurity.com").unwrap().as_str(),
            "https://api-xxxxxxxx.duosecurity.com/"
        );
        assert_eq!(
            service_url("http://127.0.0.1:8080").unwrap().as_str(),
            "http://127.0.0.1:8080/"
        );
        assert!(service_url("").is_err());
        assert!(service_url("ftp://example.com").is_err());
        assert!(service_url("https://example.com/auth").is_err());
        assert!(service_url("exa mple.com").is_err());
    }

    #[test]
    fn test_authority() {
        let cases = [
            ("api-xxxxxxxx.duosecurity.com", "api-xxxxxxxx.duosecurity.com"),
            ("https://API.example.com:443/", "api.example.com"),
            ("http://127.0.0.1:1234/", "127.0.0.1:1234"),
            ("https://api.example.com:8443", "api.example.com:8443"),
        ];
        for (host, expected) in cases {
            let url = service_url(host).unwrap();
            assert_eq!(authority(&url).as_deref(), Some(expected), "{host}");

            let config = Config::new(keys(), host, BypassConfig::default(), 300, 5).unwrap();
            assert_eq!(config.service_host(), expected);
            assert!(!config.service_host().contains("://"));
        }
    }

    #[test]
    fn test_config_new() {
        let bypass = BypassConfig::new(false, vec!["10.0.0.0/8".to_string()]);
        let config = Config::new(keys(), " api.example.com ", bypass, 300, 5).unwrap();
        assert_eq!(config.service_host(), "api.example.com");
        assert_eq!(config.challenge_ttl(), Duration::from_secs(300));
        assert_eq!(config.service_timeout(), Duration::from_secs(5));
        assert_eq!(config.bypass().ip_ranges.len(), 1);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let bypass = BypassConfig::new(false, vec!["10.0.0.0/33".to_string()]);
        assert!(matches!(
            Config::new(keys(), "api.example.com", bypass, 300, 5),
            Err(ConfigError::InvalidBypassRange { .. })
        ));
        assert_eq!(
            Config::new(keys(), "api.example.com", BypassConfig::default(), 0, 5).unwrap_err(),
            ConfigError::InvalidChallengeTtl
        );
        assert_eq!(
            Config::new(keys(), "api.example.com", BypassConfig::default(), 300, 0).unwrap_err(),
            ConfigError::InvalidServiceTimeout
        );
        assert_eq!(
            Config::new(keys(), "api.example.com", BypassConfig::default(), 300, 61).unwrap_err(),
            ConfigError::InvalidServiceTimeout
        );
    }
}
