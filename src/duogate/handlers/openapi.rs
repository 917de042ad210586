use crate::duogate::ApiDoc;
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

// axum handler for the OpenAPI document
pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
