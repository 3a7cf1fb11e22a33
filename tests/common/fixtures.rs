//! Downloader fixtures and archive helpers

use bulk_media_download::db::{NewFile, NewMediaField};
use bulk_media_download::types::FileId;
use bulk_media_download::{BulkDownloader, Config, MappingRow, RecordId};
use std::io::Read;
use std::path::PathBuf;
use tempfile::TempDir;

/// A downloader whose `public://` files live in `<tempdir>/files` and whose
/// archives are written to `<tempdir>/temp`
pub struct Fixture {
    pub downloader: BulkDownloader,
    pub dir: TempDir,
}

impl Fixture {
    pub async fn new(field_mapping: Vec<MappingRow>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("files")).expect("files dir");

        let mut config = Config {
            field_mapping,
            ..Default::default()
        };
        config.persistence.database_path = dir.path().join("content.db");
        config.download.temp_dir = dir.path().join("temp");
        config
            .download
            .stream_wrappers
            .insert("public".to_string(), dir.path().join("files"));

        let downloader = BulkDownloader::new(config)
            .await
            .expect("downloader should start");
        Self { downloader, dir }
    }

    pub fn public_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("files").join(name)
    }

    /// Write a public file and register it
    pub async fn file(&self, name: &str, bytes: &[u8]) -> FileId {
        std::fs::write(self.public_path(name), bytes).expect("write public file");
        self.downloader
            .db
            .insert_file(&NewFile::new(name, format!("public://{}", name)))
            .await
            .expect("insert file")
    }

    /// A record whose `field_name` references `targets`
    pub async fn record(&self, field_name: &str, targets: &[i64]) -> RecordId {
        let record = self
            .downloader
            .db
            .insert_record("Fixture record")
            .await
            .expect("insert record");
        self.downloader
            .db
            .set_record_field(record, field_name, targets)
            .await
            .expect("set field");
        record
    }

    /// A media object with one image sub-field
    pub async fn image_media(&self, image: FileId) -> i64 {
        self.downloader
            .db
            .insert_media(
                "Fixture media",
                &[
                    NewMediaField::plain("name", "string"),
                    NewMediaField::file_ref("field_media_image", "image", image),
                ],
            )
            .await
            .expect("insert media")
    }

    /// Files left in the temp directory
    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("temp"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Entry names and contents of an in-memory zip, in archive order
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).expect("zip entry");
            let mut content = Vec::new();
            entry.read_to_end(&mut content).expect("read zip entry");
            (entry.name().to_string(), content)
        })
        .collect()
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    zip_entries(bytes).into_iter().map(|(name, _)| name).collect()
}
