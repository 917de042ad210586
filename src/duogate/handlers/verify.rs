use crate::duogate::handlers::{user_context, ErrorResponse};
use crate::provider::Provider;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct VerifyRequest {
    user: String,
    /// User backend class name, `LDAP` for directory accounts.
    backend: String,
    /// Signed response token returned by the verification service.
    response: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct VerifyResponse {
    verified: bool,
}

#[utoipa::path(
    post,
    path= "/v1/verify",
    request_body = VerifyRequest,
    responses (
        (status = 200, description = "Response verified", body = VerifyResponse, content_type = "application/json"),
        (status = 400, description = "Missing or invalid payload", body = ErrorResponse),
        (status = 401, description = "Response rejected", body = VerifyResponse),
    ),
    tag= "duo"
)]
// axum handler to check a challenge response
#[instrument(skip(provider, payload))]
pub async fn verify(
    provider: Extension<Arc<Provider>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let request: VerifyRequest = match payload {
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

    if provider.verify(&user, &request.response) {
        (StatusCode::OK, Json(VerifyResponse { verified: true })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse { verified: false }),
        )
            .into_response()
    }
}
