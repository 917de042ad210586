use crate::provider::Provider;
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

const REQUEST_ID: &str = "x-request-id";

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::policy::policy,
        handlers::challenge::challenge,
        handlers::verify::verify,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::policy::PolicyRequest,
        handlers::policy::PolicyResponse,
        handlers::challenge::ChallengeRequest,
        crate::provider::ChallengePrompt,
        handlers::verify::VerifyRequest,
        handlers::verify::VerifyResponse,
        handlers::ErrorResponse,
    )),
    tags(
        (name = "health", description = "Service status"),
        (name = "duo", description = "Second factor policy and challenge verification"),
    )
)]
pub struct ApiDoc;

/// Build the application router with every route and layer.
#[must_use]
pub fn router(provider: Arc<Provider>) -> Router {
    Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/openapi.json", get(handlers::openapi))
        .route("/v1/policy", post(handlers::policy))
        .route("/v1/challenge", post(handlers::challenge))
        .route("/v1/verify", post(handlers::verify))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(provider)),
        )
}

/// Serve the API until ctrl-c.
/// # Errors
/// Returns an error if the listener can't be bound or the server fails
pub async fn new(port: u16, provider: Arc<Provider>) -> Result<()> {
    let app = router(provider);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // headers are left out, they may carry credentials
    debug_span!("http-request", %method, path, request_id)
}
