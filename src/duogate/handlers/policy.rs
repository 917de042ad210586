use crate::duogate::handlers::{user_context, ErrorResponse};
use crate::provider::Provider;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct PolicyRequest {
    user: String,
    /// User backend class name, `LDAP` for directory accounts.
    backend: String,
    source_ip: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct PolicyResponse {
    require_second_factor: bool,
}

#[utoipa::path(
    post,
    path= "/v1/policy",
    request_body = PolicyRequest,
    responses (
        (status = 200, description = "Bypass policy decision", body = PolicyResponse, content_type = "application/json"),
        (status = 400, description = "Missing or invalid payload", body = ErrorResponse),
    ),
    tag= "duo"
)]
// axum handler for the bypass policy
#[instrument(skip(provider, payload))]
pub async fn policy(
    provider: Extension<Arc<Provider>>,
    payload: Option<Json<PolicyRequest>>,
) -> impl IntoResponse {
    let request: PolicyRequest = match payload {
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
    let require_second_factor = provider.requires_second_factor_from(&user, &request.source_ip);

    info!(user = %user.id, require_second_factor, "policy evaluated");

    (
        StatusCode::OK,
        Json(PolicyResponse {
            require_second_factor,
        }),
    )
        .into_response()
}
