use crate::challenge::codec::{ChallengeCodec, ChallengeRequest, ChallengeToken};
use crate::challenge::error::{ChallengeError, VerificationError};
use crate::config::{Config, DuoKeys};
use crate::policy::UserContext;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Life of one authentication attempt.
///
/// `Issued` is the only state that moves; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Issued,
    Verified,
    Rejected,
    Expired,
}

impl ChallengeState {
    #[must_use]
    pub fn transition<T>(self, result: &Result<T, VerificationError>) -> Self {
        match self {
            Self::Issued => match result {
                Ok(_) => Self::Verified,
                Err(VerificationError::Expired) => Self::Expired,
                Err(_) => Self::Rejected,
            },
            terminal => terminal,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Issued)
    }
}

/// Outcome of checking one response; `error` carries the reason for the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub state: ChallengeState,
    pub error: Option<VerificationError>,
}

impl Verification {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self.state, ChallengeState::Verified)
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeVerifier {
    codec: ChallengeCodec,
    keys: DuoKeys,
}

impl ChallengeVerifier {
    #[must_use]
    pub const fn new(keys: DuoKeys, ttl: Duration) -> Self {
        Self {
            codec: ChallengeCodec::new(ttl),
            keys,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.keys().clone(), config.challenge_ttl())
    }

    /// # Errors
    /// Returns an error if the user id is empty or the token can't be signed.
    pub fn issue_challenge(&self, user: &UserContext) -> Result<ChallengeToken, ChallengeError> {
        self.issue_challenge_at(user, Utc::now().timestamp())
    }

    /// # Errors
    /// Returns an error if the user id is empty or the token can't be signed.
    pub fn issue_challenge_at(
        &self,
        user: &UserContext,
        now: i64,
    ) -> Result<ChallengeToken, ChallengeError> {
        let token = self
            .codec
            .build_request(&ChallengeRequest::new(&self.keys, &user.id), now)?;

        info!(user = %user.id, ttl = self.codec.ttl().as_secs(), "challenge issued");

        Ok(token)
    }

    /// Check `raw_response` for `user` at `now`.
    ///
    /// # Errors
    /// Returns why the response was rejected.
    pub fn check_at(
        &self,
        user: &UserContext,
        raw_response: &str,
        now: i64,
    ) -> Result<(), VerificationError> {
        let username = self.codec.extract_and_verify(
            raw_response,
            &ChallengeRequest::new(&self.keys, &user.id),
            now,
        )?;

        if username == user.id {
            Ok(())
        } else {
            Err(VerificationError::IdentityMismatch)
        }
    }

    #[must_use]
    pub fn verify_at(&self, user: &UserContext, raw_response: &str, now: i64) -> Verification {
        let result = self.check_at(user, raw_response, now);
        let state = ChallengeState::Issued.transition(&result);

        match result {
            Ok(()) => {
                info!(user = %user.id, "challenge response verified");

                Verification { state, error: None }
            }
            Err(error) => {
                warn!(
                    user = %user.id,
                    kind = error.kind(),
                    ?state,
                    "challenge response rejected"
                );

                Verification {
                    state,
                    error: Some(error),
                }
            }
        }
    }

    /// `true` only for a genuine, unexpired service response for this user.
    #[must_use]
    pub fn verify(&self, user: &UserContext, raw_response: &str) -> bool {
        self.verify_at(user, raw_response, Utc::now().timestamp())
            .is_verified()
    }
}
