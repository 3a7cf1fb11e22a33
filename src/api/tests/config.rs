use super::*;
use crate::downloader::REDACTED;

#[tokio::test]
async fn config_is_served_with_mapping() {
    let (_downloader, app, _temp_dir) =
        create_test_app(vec![MappingRow::new("field_docs", "file").with_view("documents")]).await;

    let response = app.oneshot(get("/config", "s1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["field_mapping"][0]["field_name"], "field_docs");
    assert_eq!(json["zip_filename"], "Download.zip");
}

#[tokio::test]
async fn config_redacts_api_key() {
    let (_downloader, app, _temp_dir) = create_protected_app("secret-key").await;

    let request = Request::builder()
        .uri("/config")
        .header(auth::API_KEY_HEADER, "secret-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["api"]["api_key"], REDACTED);
}

#[tokio::test]
async fn mapping_update_replaces_table_and_reports_ignored_rows() {
    let (downloader, app, _temp_dir) = create_test_app(Vec::new()).await;

    let body = serde_json::json!({
        "field_mapping": [
            { "view": "galleries", "field_type": "media", "field_name": "field_image" },
            { "field_type": "video", "field_name": "field_clip" },
            { "field_type": "", "field_name": "" }
        ]
    });
    let response = app
        .oneshot(json_request("PUT", "/config/mapping", "s1", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["field_mapping"].as_array().unwrap().len(), 3);
    let ignored = json["ignored"].as_array().unwrap();
    assert!(ignored.iter().any(|issue| issue["field_name"] == "field_clip"));

    let live = downloader.get_field_mapping().await;
    assert_eq!(live[0].field_name, "field_image");
}

#[tokio::test]
async fn malformed_mapping_is_rejected() {
    let (_downloader, app, _temp_dir) = create_test_app(Vec::new()).await;

    let body = serde_json::json!({ "field_mapping": "not a list" });
    let response = app
        .oneshot(json_request("PUT", "/config/mapping", "s1", body))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn admin_routes_require_api_key() {
    let (_downloader, app, _temp_dir) = create_protected_app("secret-key").await;

    let response = app.clone().oneshot(get("/config", "s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = serde_json::json!({ "record_ids": [1] });
    let response = app
        .oneshot(json_request("POST", "/actions/bulk-download", "s1", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn open_routes_ignore_api_key() {
    let (_downloader, app, _temp_dir) = create_protected_app("secret-key").await;

    for uri in ["/health", "/openapi.json", "/messages"] {
        let response = app.clone().oneshot(get(uri, "s1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri} should be open");
    }

    // Nothing selected yet: an empty archive, but no key needed
    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
