//! Caller-facing second-factor provider.
//!
//! Ties the bypass policy, the challenge verifier and the service client together behind
//! one immutable value that can be shared between requests with an `Arc`.

use crate::challenge::{ChallengeError, ChallengeVerifier};
use crate::config::Config;
use crate::policy::{BypassPolicy, UserContext};
use crate::service::{ServiceClient, ServiceError};
use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;
use tracing::{error, instrument};
use utoipa::ToSchema;

pub const PROVIDER_ID: &str = "duo";
pub const DISPLAY_NAME: &str = "Duo";
pub const DESCRIPTION: &str = "Duo Security second factor";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// What the login page needs to start the interactive challenge.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChallengePrompt {
    /// Verification service host the page talks to.
    pub host: String,
    /// Signed `TX` token.
    pub sig_request: String,
}

#[derive(Debug)]
pub struct Provider {
    config: Config,
    policy: BypassPolicy,
    verifier: ChallengeVerifier,
    service: ServiceClient,
}

impl Provider {
    /// # Errors
    /// Returns an error if the HTTP client for the verification service can't be built.
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let service = ServiceClient::from_config(&config)?;

        Ok(Self {
            policy: BypassPolicy::from_config(config.bypass()),
            verifier: ChallengeVerifier::from_config(&config),
            service,
            config,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        DESCRIPTION
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn requires_second_factor(&self, user: &UserContext, source_ip: IpAddr) -> bool {
        self.policy.requires_second_factor(user, source_ip)
    }

    /// Textual source address; anything that doesn't parse requires the second factor.
    #[must_use]
    pub fn requires_second_factor_from(&self, user: &UserContext, source_ip: &str) -> bool {
        self.policy.requires_second_factor_from(user, source_ip)
    }

    /// Check the verification service is usable, then sign a challenge for `user`.
    ///
    /// No challenge is produced while the service is unreachable, slow or refusing our
    /// credentials. Dropping the future abandons the check without side effects.
    ///
    /// # Errors
    /// Returns [`ProviderError::Service`] if the service check fails, or
    /// [`ProviderError::Challenge`] if the token can't be built.
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn issue_challenge(
        &self,
        user: &UserContext,
    ) -> Result<ChallengePrompt, ProviderError> {
        if let Err(e) = self.service.check().await {
            error!(error = %e, "verification service unavailable, no challenge issued");

            return Err(e.into());
        }

        let token = self.verifier.issue_challenge(user)?;

        Ok(ChallengePrompt {
            host: self.config.service_host().to_string(),
            sig_request: token.into_string(),
        })
    }

    #[must_use]
    pub fn verify(&self, user: &UserContext, raw_response: &str) -> bool {
        self.verifier.verify(user, raw_response)
    }

    /// `Content-Security-Policy` value that lets the challenge page embed the service.
    #[must_use]
    pub fn content_security_policy(&self) -> String {
        let origin = self.config.service_url().origin().ascii_serialization();

        format!(
            "frame-src 'self' {origin}; child-src 'self' {origin}; \
             style-src 'self' 'unsafe-inline' {origin}"
        )
    }
}
