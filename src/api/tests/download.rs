use super::*;
use crate::downloader::test_helpers::{
    seed_file, seed_record_with_files, seed_record_with_image, temp_file_count, zip_entries,
};
use crate::types::NoticeLevel;

#[tokio::test]
async fn action_then_download_streams_zip_and_cleans_up() {
    let (downloader, app, tmp) =
        create_test_app(vec![MappingRow::new("field_image", "media").with_view("galleries")])
            .await;
    let image = seed_file(&downloader, &tmp, "cat.png", b"\x89PNG cat").await;
    let record = seed_record_with_image(&downloader, "field_image", image).await;

    let body = serde_json::json!({ "record_ids": [record.0] });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/actions/bulk-download", "s1", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/zip"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Download.zip\""
    );

    let bytes = body_bytes(response).await;
    assert_eq!(
        zip_entries(&bytes),
        vec![("cat.png".to_string(), b"\x89PNG cat".to_vec())]
    );
    assert_eq!(temp_file_count(&tmp), 0);
}

#[tokio::test]
async fn download_keeps_selection_order() {
    let (downloader, app, tmp) =
        create_test_app(vec![MappingRow::new("field_docs", "file").with_view("documents")]).await;
    let a = seed_file(&downloader, &tmp, "a.pdf", b"A").await;
    let b = seed_file(&downloader, &tmp, "b.pdf", b"B").await;
    let first = seed_record_with_files(&downloader, "field_docs", &[b]).await;
    let second = seed_record_with_files(&downloader, "field_docs", &[a]).await;
    downloader
        .bulk_action("s1", vec![first, second])
        .await
        .unwrap();

    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();

    let names: Vec<String> = zip_entries(&body_bytes(response).await)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["b.pdf", "a.pdf"]);
}

#[tokio::test]
async fn download_without_mapping_redirects_with_error_notice() {
    let (downloader, app, _tmp) = create_test_app(Vec::new()).await;

    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let notices = downloader.session("s1").take_notices().await.unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(
        notices[0].message,
        "No fields are selected, please select them from the config form."
    );
}

#[tokio::test]
async fn download_with_missing_files_queues_warnings() {
    let (downloader, app, tmp) =
        create_test_app(vec![MappingRow::new("field_docs", "file").with_view("documents")]).await;
    let present = seed_file(&downloader, &tmp, "present.pdf", b"here").await;
    let gone = seed_file(&downloader, &tmp, "gone.pdf", b"soon gone").await;
    std::fs::remove_file(test_helpers::public_path(&tmp, "gone.pdf")).unwrap();
    let record = seed_record_with_files(&downloader, "field_docs", &[present, gone]).await;
    downloader.bulk_action("s1", vec![record]).await.unwrap();
    // Drop the bulk-action status notice
    downloader.session("s1").take_notices().await.unwrap();

    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = zip_entries(&body_bytes(response).await)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["present.pdf"]);

    let notices = downloader.session("s1").take_notices().await.unwrap();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Warning));
}

#[tokio::test]
async fn download_with_empty_selection_serves_empty_zip() {
    let (downloader, app, tmp) =
        create_test_app(vec![MappingRow::new("field_docs", "file").with_view("documents")]).await;
    downloader.bulk_action("s1", Vec::new()).await.unwrap();

    let response = app.oneshot(get("/download/zip", "s1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body_bytes(response).await;
    assert!(zip_entries(&bytes).is_empty());
    assert_eq!(temp_file_count(&tmp), 0);
}

#[tokio::test]
async fn download_route_follows_config() {
    let (downloader, _app, _tmp) =
        create_test_app(vec![MappingRow::new("field_docs", "file").with_view("documents")]).await;

    let mut config = (*downloader.config).clone();
    config.download.download_route = "/files/archive".to_string();
    let app = create_router(downloader, Arc::new(config));

    let response = app.clone().oneshot(get("/download/zip", "s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/files/archive", "s1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
}
