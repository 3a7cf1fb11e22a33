use super::*;
use crate::config::MappingRow;
use crate::downloader::test_helpers;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

mod config;
mod download;

/// Test downloader wrapped in Arc, plus the router built from its config
async fn create_test_app(
    field_mapping: Vec<MappingRow>,
) -> (Arc<BulkDownloader>, Router, tempfile::TempDir) {
    let (downloader, temp_dir) = test_helpers::create_test_downloader(field_mapping).await;
    let downloader = Arc::new(downloader);
    let app = create_router(downloader.clone(), downloader.config.clone());
    (downloader, app, temp_dir)
}

/// Same as [`create_test_app`] but with an API key configured
async fn create_protected_app(
    key: &str,
) -> (Arc<BulkDownloader>, Router, tempfile::TempDir) {
    let (downloader, temp_dir) = test_helpers::create_test_downloader(vec![
        MappingRow::new("field_docs", "file").with_view("documents"),
    ])
    .await;
    let mut config = (*downloader.config).clone();
    config.server.api.api_key = Some(key.to_string());
    let downloader = Arc::new(BulkDownloader::with_database(config, downloader.db.clone()));
    let app = create_router(downloader.clone(), downloader.config.clone());
    (downloader, app, temp_dir)
}

fn get(uri: &str, session: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(session::SESSION_HEADER, session)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, session: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(session::SESSION_HEADER, session)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let (downloader, _app, _temp_dir) = create_test_app(Vec::new()).await;

    let mut config = (*downloader.config).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(
        downloader.clone(),
        Arc::new(config),
        async move {
            let _ = rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let (downloader, _app, _temp_dir) = create_test_app(Vec::new()).await;

    let mut config = (*downloader.config).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_headers_absent_by_default() {
    let (_downloader, app, _temp_dir) = create_test_app(Vec::new()).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[test]
fn cors_layer_accepts_explicit_origins() {
    // Unparseable origins are dropped rather than failing router construction
    let _layer = build_cors_layer(&[
        "http://localhost:3000".to_string(),
        "not a header\nvalue".to_string(),
    ]);
}
