use crate::duogate::handlers::{user_context, ErrorResponse};
use crate::provider::{ChallengePrompt, Provider};
use axum::{
    extract::Extension,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct ChallengeRequest {
    user: String,
    /// User backend class name, `LDAP` for directory accounts.
    backend: String,
}

#[utoipa::path(
    post,
    path= "/v1/challenge",
    request_body = ChallengeRequest,
    responses (
        (status = 200, description = "Challenge issued", body = ChallengePrompt, content_type = "application/json"),
        (status = 400, description = "Missing or invalid payload", body = ErrorResponse),
        (status = 503, description = "Verification service unavailable", body = ErrorResponse),
    ),
    tag= "duo"
)]
// axum handler to start a challenge
#[instrument(skip(provider, payload))]
pub async fn challenge(
    provider: Extension<Arc<Provider>>,
    payload: Option<Json<ChallengeRequest>>,
) -> impl IntoResponse {
    let request: ChallengeRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing payload")),
            )
                .into_response()
        }
    };

    let Some(user) = user_context(&request.user, &request.backend) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid user or backend")),
        )
            .into_response();
    };

    match provider.issue_challenge(&user).await {
        Ok(prompt) => {
            let mut headers = HeaderMap::new();
            match HeaderValue::from_str(&provider.content_security_policy()) {
                Ok(csp) => {
                    headers.insert(header::CONTENT_SECURITY_POLICY, csp);
                }
                Err(e) => {
                    error!("Failed to build Content-Security-Policy header: {}", e);
                }
            }

            (StatusCode::OK, headers, Json(prompt)).into_response()
        }
        Err(e) => {
            error!("Error issuing challenge: {}", e);

            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Second factor temporarily unavailable")),
            )
                .into_response()
        }
    }
}
