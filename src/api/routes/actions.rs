//! Bulk action handlers.

use super::BulkActionRequest;
use crate::api::AppState;
use crate::api::session::Session;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

/// POST /actions/bulk-download - Select records for download
///
/// Stores the selection in the caller's session and queues a notice linking
/// to the download. The response carries the redirect target (the first
/// configured view).
#[utoipa::path(
    post,
    path = "/actions/bulk-download",
    tag = "actions",
    request_body = BulkActionRequest,
    responses(
        (status = 200, description = "Selection stored", body = crate::selection::BulkActionOutcome),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 409, description = "No view configured to return to", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn bulk_download_action(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<BulkActionRequest>,
) -> Response {
    let result = state
        .downloader
        .bulk_action(&session.id, request.record_ids)
        .await;

    let response = match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            if let Err(report) = state.downloader.report_failure(&session.id, &e).await {
                tracing::warn!(error = %report, "failed to queue failure notice");
            }
            e.into_response()
        }
    };

    session.attach(response)
}
