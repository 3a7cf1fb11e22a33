//! Configuration handlers.

use super::{UpdateMappingRequest, UpdateMappingResponse};
use crate::api::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// GET /config - Get current config (sensitive fields redacted)
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = crate::config::Config),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.downloader.get_redacted_config().await))
}

/// PUT /config/mapping - Replace the field-mapping table
#[utoipa::path(
    put,
    path = "/config/mapping",
    tag = "config",
    request_body = UpdateMappingRequest,
    responses(
        (status = 200, description = "Mapping replaced", body = UpdateMappingResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn update_mapping(
    State(state): State<AppState>,
    Json(request): Json<UpdateMappingRequest>,
) -> impl IntoResponse {
    let ignored = state
        .downloader
        .update_field_mapping(request.field_mapping)
        .await;

    Json(UpdateMappingResponse {
        field_mapping: state.downloader.get_field_mapping().await,
        ignored,
    })
}
