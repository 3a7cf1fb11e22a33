//! Record field access
//!
//! The resolver does not know how records, media objects and files are
//! stored. It reads them through [`ContentSource`], which the
//! [`Database`](crate::db::Database) implements for the bundled SQLite store.

use crate::error::Result;
use crate::types::{FileId, MediaId, RecordId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Declared type of a media sub-field that holds a file
pub const SUB_FIELD_FILE: &str = "file";

/// Declared type of a media sub-field that holds an image
pub const SUB_FIELD_IMAGE: &str = "image";

/// A managed file: a stored URI plus the name the file was uploaded under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileObject {
    /// File id
    pub id: FileId,
    /// Original filename, used as the archive entry name
    pub filename: String,
    /// Stored location, e.g. `public://2024/cat.png` or an absolute path
    pub uri: String,
}

/// One field of a media object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaField {
    /// Machine name of the field
    pub name: String,
    /// Declared field type (`file`, `image`, `string`, ...)
    pub field_type: String,
    /// Referenced file, for file and image fields
    pub file_id: Option<FileId>,
}

impl MediaField {
    /// Whether this field is declared to carry a file or an image
    pub fn holds_file(&self) -> bool {
        self.field_type == SUB_FIELD_FILE || self.field_type == SUB_FIELD_IMAGE
    }
}

/// A media object wrapping one or more files or images
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaObject {
    /// Media id
    pub id: MediaId,
    /// Label of the media object
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<MediaField>,
}

/// Read access to records, media objects and files
///
/// Implementations return `Ok(None)` for things that do not exist; `Err` is
/// reserved for storage failures, which abort the current operation.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Whether a record with this id exists
    async fn record_exists(&self, record_id: RecordId) -> Result<bool>;

    /// Ids referenced by a record field, in declaration order
    ///
    /// Returns `None` when the record does not expose the field at all, and
    /// an empty list when the field exists but is empty.
    async fn field_references(
        &self,
        record_id: RecordId,
        field_name: &str,
    ) -> Result<Option<Vec<i64>>>;

    /// Load a media object with its fields
    async fn load_media(&self, media_id: MediaId) -> Result<Option<MediaObject>>;

    /// Load a managed file
    async fn load_file(&self, file_id: FileId) -> Result<Option<FileObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_file_and_image_fields_hold_files() {
        let field = |field_type: &str| MediaField {
            name: "field_media".into(),
            field_type: field_type.into(),
            file_id: Some(1),
        };
        assert!(field("file").holds_file());
        assert!(field("image").holds_file());
        assert!(!field("string").holds_file());
        assert!(!field("entity_reference").holds_file());
    }
}
