//! REST API server module
//!
//! Exposes the bulk action, the archive download and the configuration
//! surface over HTTP, with an OpenAPI description generated by utoipa.

use crate::{BulkDownloader, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod session;
pub mod state;

pub use openapi::ApiDoc;
pub use session::Session;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Actions (API key required when configured)
/// - `POST /actions/bulk-download` - Store a selection and queue the download notice
///
/// ## Configuration (API key required when configured)
/// - `GET /config` - Get current config (sensitive fields redacted)
/// - `PUT /config/mapping` - Replace the field-mapping table
///
/// ## Download
/// - `GET <download_route>` - Stream the session's archive (default `/download/zip`)
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /messages` - Drain the session's notices
pub fn create_router(downloader: Arc<BulkDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let admin = Router::new()
        .route("/actions/bulk-download", post(routes::bulk_download_action))
        .route("/config", get(routes::get_config))
        .route("/config/mapping", put(routes::update_mapping));

    // Auth wraps the administrative routes only; the download link has to
    // work from a plain browser request.
    let admin = match config.server.api.api_key.clone() {
        Some(key) => admin.layer(middleware::from_fn_with_state(
            Some(key),
            auth::require_api_key,
        )),
        None => admin,
    };

    let router = Router::new()
        .route(&config.download.download_route, get(routes::download_zip))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/messages", get(routes::get_messages))
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        router.layer(build_cors_layer(&config.server.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the process is stopped. Use [`serve_with_shutdown`] to stop on
/// a signal.
///
/// # Example
///
/// ```no_run
/// use bulk_media_download::{BulkDownloader, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(BulkDownloader::new((*config).clone()).await?);
///
/// bulk_media_download::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<BulkDownloader>, config: Arc<Config>) -> Result<()> {
    serve_with_shutdown(downloader, config, std::future::pending()).await
}

/// Serve the API until `shutdown` resolves, then drain in-flight requests
pub async fn serve_with_shutdown<F>(
    downloader: Arc<BulkDownloader>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
