#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::config::{Config, DuoKeys};
use crate::policy::BypassConfig;
use crate::service::{canonical_request, signature, CHECK_PATH};
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use base64ct::{Base64, Encoding};
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const IKEY: &str = "DIXXXXXXXXXXXXXXXXXX";
pub const SKEY: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
pub const AKEY: &str = "useacustomerprovidedapplicationsecretkey";

pub fn keys() -> DuoKeys {
    DuoKeys::new(
        IKEY,
        SecretString::from(SKEY.to_string()),
        SecretString::from(AKEY.to_string()),
    )
    .unwrap()
}

pub fn config(host: &str, bypass: BypassConfig) -> Config {
    Config::new(keys(), host, bypass, 300, 1).unwrap()
}

/// How the fake verification service answers `/auth/v2/check`.
#[derive(Debug, Clone, Copy)]
pub enum MockService {
    Ok,
    Fail,
    Unauthorized,
    Slow(Duration),
}

/// Serve a fake verification service on an ephemeral local port.
pub async fn spawn_service(mode: MockService) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().route(
        CHECK_PATH,
        get(move |headers: HeaderMap| async move {
            match mode {
                MockService::Ok => {
                    if authorized(&headers) {
                        Json(json!({"stat": "OK", "response": {"time": 1_700_000_000}}))
                            .into_response()
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({
                                "stat": "FAIL",
                                "code": 40103,
                                "message": "Invalid signature in request credentials",
                            })),
                        )
                            .into_response()
                    }
                }
                MockService::Fail => {
                    Json(json!({
                        "stat": "FAIL",
                        "code": 40002,
                        "message": "Invalid request parameters",
                    }))
                    .into_response()
                }
                MockService::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, Json(json!({"stat": "FAIL"}))).into_response()
                }
                MockService::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Json(json!({"stat": "OK"})).into_response()
                }
            }
        }),
    );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Recompute the request signature the way the real service does.
fn authorized(headers: &HeaderMap) -> bool {
    let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok());

    let (Some(auth), Some(date), Some(host)) = (
        header_str(header::AUTHORIZATION),
        header_str(header::DATE),
        header_str(header::HOST),
    ) else {
        return false;
    };

    let Some(encoded) = auth.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = Base64::decode_vec(encoded) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((ikey, sig)) = credentials.split_once(':') else {
        return false;
    };

    let canonical = canonical_request(date, "GET", host, CHECK_PATH);
    let expected = signature(&SecretString::from(SKEY.to_string()), &canonical).unwrap();

    ikey == IKEY && sig == expected
}
