//! Shared test helpers for creating BulkDownloader instances in tests.

use crate::config::{Config, MappingRow};
use crate::db::{NewFile, NewMediaField};
use crate::downloader::BulkDownloader;
use crate::types::{FileId, RecordId};
use std::path::PathBuf;
use tempfile::tempdir;

/// Helper to create a test BulkDownloader with a persistent database.
/// Returns the downloader and the tempdir (which must be kept alive).
///
/// `public://` resolves to `<tempdir>/files`; archives go to `<tempdir>/temp`.
pub(crate) async fn create_test_downloader(
    field_mapping: Vec<MappingRow>,
) -> (BulkDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config {
        field_mapping,
        ..Default::default()
    };
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.temp_dir = temp_dir.path().join("temp");
    config
        .download
        .stream_wrappers
        .insert("public".to_string(), temp_dir.path().join("files"));

    std::fs::create_dir_all(temp_dir.path().join("files")).unwrap();

    let downloader = BulkDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Location of a public file inside the test directory
pub(crate) fn public_path(temp_dir: &tempfile::TempDir, name: &str) -> PathBuf {
    temp_dir.path().join("files").join(name)
}

/// Write a public file and register it
pub(crate) async fn seed_file(
    downloader: &BulkDownloader,
    temp_dir: &tempfile::TempDir,
    name: &str,
    bytes: &[u8],
) -> FileId {
    std::fs::write(public_path(temp_dir, name), bytes).unwrap();
    downloader
        .db
        .insert_file(&NewFile::new(name, format!("public://{}", name)))
        .await
        .unwrap()
}

/// A record whose `field_name` references the given files
pub(crate) async fn seed_record_with_files(
    downloader: &BulkDownloader,
    field_name: &str,
    files: &[FileId],
) -> RecordId {
    let record = downloader.db.insert_record("Test record").await.unwrap();
    downloader
        .db
        .set_record_field(record, field_name, files)
        .await
        .unwrap();
    record
}

/// A record whose `field_name` references a media object wrapping `image`
pub(crate) async fn seed_record_with_image(
    downloader: &BulkDownloader,
    field_name: &str,
    image: FileId,
) -> RecordId {
    let media = downloader
        .db
        .insert_media(
            "Test media",
            &[NewMediaField::file_ref("field_media_image", "image", image)],
        )
        .await
        .unwrap();
    seed_record_with_files(downloader, field_name, &[media]).await
}

/// Names and contents of every entry in a zip held in memory
pub(crate) fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            (entry.name().to_string(), content)
        })
        .collect()
}

/// Number of files currently in the temp directory
pub(crate) fn temp_file_count(temp_dir: &tempfile::TempDir) -> usize {
    match std::fs::read_dir(temp_dir.path().join("temp")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
