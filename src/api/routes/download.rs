//! Archive download handler.

use crate::api::AppState;
use crate::api::session::Session;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

/// Where failed downloads send the browser
pub const FAILURE_REDIRECT: &str = "/";

/// GET /download/zip - Download the selected files as one zip archive
///
/// On success the archive is streamed and deleted afterwards. On failure the
/// browser is redirected to the front page and an error notice is queued in
/// the session.
#[utoipa::path(
    get,
    path = "/download/zip",
    tag = "download",
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip"),
        (status = 303, description = "Download failed; redirect to the front page with an error notice")
    )
)]
pub async fn download_zip(State(state): State<AppState>, session: Session) -> Response {
    let response = match state.downloader.download(&session.id).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "download failed, redirecting");
            if let Err(report) = state.downloader.report_failure(&session.id, &e).await {
                tracing::error!(error = %report, "failed to queue failure notice");
            }
            Redirect::to(FAILURE_REDIRECT).into_response()
        }
    };

    session.attach(response)
}
