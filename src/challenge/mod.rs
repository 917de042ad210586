//! Challenge round trip with the verification service.
//!
//! [`ChallengeVerifier`] issues a signed `TX` token for the prompt and later accepts
//! only a signed, unexpired `AUTH` token for the same user and integration.

pub mod codec;
pub mod error;
pub mod verifier;

pub use self::codec::{ChallengeCodec, ChallengeRequest, ChallengeToken, Direction};
pub use self::error::{ChallengeError, VerificationError};
pub use self::verifier::{ChallengeState, ChallengeVerifier, Verification};
