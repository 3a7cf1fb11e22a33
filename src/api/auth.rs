//! API key check for the administrative routes
//!
//! When `ApiConfig::api_key` is set, configuration and bulk-action requests
//! must carry the same key in `X-Api-Key`. The download and messages routes
//! are session-scoped and stay open so a browser can follow a plain link.

use crate::error::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Header the API key is read from
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware rejecting requests whose `X-Api-Key` does not match
///
/// With no key configured every request passes.
///
/// ```no_run
/// use axum::{Router, middleware};
/// use bulk_media_download::api::auth::require_api_key;
///
/// let router: Router = Router::new().layer(middleware::from_fn_with_state(
///     Some("secret-key-123".to_string()),
///     require_api_key,
/// ));
/// ```
pub async fn require_api_key(
    State(expected): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "rejected request with wrong API key");
            unauthorized("Invalid API key")
        }
        None => unauthorized("Missing X-Api-Key header"),
    }
}

/// Compare without exiting at the first differing byte
fn keys_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(message))).into_response()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, middleware, routing::put};
    use tower::ServiceExt;

    fn guarded(key: Option<&str>) -> Router {
        Router::new()
            .route("/config/mapping", put(|| async { StatusCode::NO_CONTENT }))
            .layer(middleware::from_fn_with_state(
                key.map(str::to_string),
                require_api_key,
            ))
    }

    async fn call(app: Router, key: Option<&str>) -> (StatusCode, Option<ApiError>) {
        let mut request = Request::builder().method("PUT").uri("/config/mapping");
        if let Some(key) = key {
            request = request.header("X-Api-Key", key);
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).ok())
    }

    #[tokio::test]
    async fn open_when_no_key_configured() {
        let (status, _) = call(guarded(None), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn matching_key_passes() {
        let (status, _) = call(guarded(Some("s3cret")), Some("s3cret")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_and_wrong_keys_are_rejected() {
        for (sent, message) in [
            (None, "Missing X-Api-Key header"),
            (Some("S3CRET"), "Invalid API key"),
            (Some("s3cret "), "Invalid API key"),
        ] {
            let (status, body) = call(guarded(Some("s3cret")), sent).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "sent {:?}", sent);
            let body = body.unwrap();
            assert_eq!(body.error.code, "unauthorized");
            assert_eq!(body.error.message, message);
        }
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match(b"abc", b"abc"));
        assert!(!keys_match(b"abc", b"abd"));
        assert!(!keys_match(b"abc", b"abcd"));
        assert!(keys_match(b"", b""));
    }
}
