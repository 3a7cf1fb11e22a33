//! System handlers: health, OpenAPI, session messages.

use crate::api::AppState;
use crate::api::session::Session;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /messages - Drain the session's queued notices
///
/// Each notice is returned once.
#[utoipa::path(
    get,
    path = "/messages",
    tag = "system",
    responses(
        (status = 200, description = "Queued notices, oldest first", body = Vec<crate::types::Notice>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn get_messages(State(state): State<AppState>, session: Session) -> Response {
    let response = match state.downloader.session(&session.id).take_notices().await {
        Ok(notices) => Json(notices).into_response(),
        Err(e) => e.into_response(),
    };
    session.attach(response)
}
