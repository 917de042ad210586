pub mod health;
pub use self::health::health;

pub mod openapi;
pub use self::openapi::openapi;

pub mod policy;
pub use self::policy::policy;

pub mod challenge;
pub use self::challenge::challenge;

pub mod verify;
pub use self::verify::verify;

// common functions for the handlers
use crate::policy::{Backend, UserContext};
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every error answer; never carries internal detail.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Build the user context from the fields every request carries.
///
/// Returns `None` for a blank user id or a blank backend, the caller answers 400.
pub fn user_context(user: &str, backend: &str) -> Option<UserContext> {
    let user = user.trim();
    if user.is_empty() {
        return None;
    }

    Backend::from_class_name(backend).map(|backend| UserContext::new(user, backend))
}
