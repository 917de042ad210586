use thiserror::Error;

/// Failure to build an outbound challenge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("failed to sign token")]
    Signing,
}

/// Why an inbound response token was not accepted.
///
/// Every variant means "reject"; the distinction exists for logs only and is never
/// shown to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued for another user or integration")]
    IdentityMismatch,
    #[error("token is not a service response")]
    WrongTokenDirection,
}

impl VerificationError {
    /// Stable label for structured logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::IdentityMismatch => "identity_mismatch",
            Self::WrongTokenDirection => "wrong_token_direction",
        }
    }
}
