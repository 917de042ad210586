//! Client for the external verification service.
//!
//! Requests are authenticated with HTTP Basic `integration_key:signature`, where the
//! signature is a hex HMAC-SHA256 (secret key) over the canonical request:
//!
//! ```text
//! <RFC 2822 date>\n<METHOD>\n<host[:port], lower case>\n<path>\n
//! ```
//!
//! Every call is bounded by the configured timeout and any failure is reported as an
//! error; callers must treat it as "no second factor available", never as a bypass.

use crate::config::{authority, Config, DuoKeys};
use crate::APP_USER_AGENT;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header::DATE, Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const CHECK_PATH: &str = "/auth/v2/check";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("verification service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("verification service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("verification service returned {0}")]
    Status(StatusCode),
    #[error("verification service rejected the request: {0}")]
    Rejected(String),
    #[error("invalid verification service endpoint: {0}")]
    Endpoint(String),
    #[error("failed to sign request")]
    Signing,
}

#[derive(Deserialize, Debug)]
struct CheckResponse {
    stat: String,
    #[serde(default)]
    message: Option<String>,
}

#[must_use]
pub fn canonical_request(date: &str, method: &str, host: &str, path: &str) -> String {
    format!(
        "{date}\n{}\n{}\n{path}\n",
        method.to_uppercase(),
        host.to_lowercase()
    )
}

/// Hex HMAC-SHA256 of `canonical` keyed by the secret key.
#[must_use]
pub fn signature(secret_key: &SecretString, canonical: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.expose_secret().as_bytes()).ok()?;
    mac.update(canonical.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: Url,
    integration_key: String,
    secret_key: SecretString,
    timeout: Duration,
}

impl ServiceClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url, keys: &DuoKeys, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            integration_key: keys.integration_key().to_string(),
            secret_key: keys.secret_key().clone(),
            timeout,
        })
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Self::new(
            config.service_url().clone(),
            config.keys(),
            config.service_timeout(),
        )
    }

    /// # Errors
    /// Returns an error if `path` can't be joined to the base URL.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, ServiceError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ServiceError::Endpoint(format!("{}{path}: {e}", self.base_url)))?;

        debug!("endpoint URL: {}", url);

        Ok(url)
    }

    /// `host[:port]` as sent in the `Host` header.
    fn authority(&self) -> Result<String, ServiceError> {
        authority(&self.base_url)
            .ok_or_else(|| ServiceError::Endpoint("no host specified".to_string()))
    }

    /// Ask the service whether it is reachable and accepts our credentials.
    ///
    /// # Errors
    /// Returns [`ServiceError::Timeout`] if no answer arrives in time, or the transport,
    /// status or rejection error otherwise.
    #[instrument(skip(self), fields(host = %self.base_url))]
    pub async fn check(&self) -> Result<(), ServiceError> {
        if let Ok(result) = tokio::time::timeout(self.timeout, self.send_check()).await {
            result
        } else {
            error!("verification service timed out after {:?}", self.timeout);

            Err(ServiceError::Timeout(self.timeout))
        }
    }

    async fn send_check(&self) -> Result<(), ServiceError> {
        let url = self.endpoint_url(CHECK_PATH)?;
        let date = Utc::now().to_rfc2822();
        let host = self.authority()?;
        let canonical = canonical_request(&date, Method::GET.as_str(), &host, CHECK_PATH);
        let signature = signature(&self.secret_key, &canonical).ok_or(ServiceError::Signing)?;

        let response = self
            .client
            .get(url)
            .header(DATE, &date)
            .basic_auth(&self.integration_key, Some(signature))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("verification service check failed: {}", status);

            return Err(ServiceError::Status(status));
        }

        let body: CheckResponse = response.json().await?;

        if body.stat == "OK" {
            debug!("verification service check ok");

            Ok(())
        } else {
            let message = body.message.unwrap_or(body.stat);

            error!("verification service rejected check: {}", message);

            Err(ServiceError::Rejected(message))
        }
    }
}
