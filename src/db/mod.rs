//! Database layer for bulk-media-download
//!
//! Handles SQLite persistence for content records, media objects, managed
//! files and per-session state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`content`] - Records, media and files, plus the [`ContentSource`](crate::content::ContentSource) implementation
//! - [`sessions`] - Per-session key/value storage

use sqlx::{FromRow, sqlite::SqlitePool};

mod content;
mod migrations;
mod sessions;

/// New managed file to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Original filename, used as the archive entry name
    pub filename: String,
    /// Stored location (`public://...` or an absolute path)
    pub uri: String,
}

impl NewFile {
    /// Create a new file description
    pub fn new(filename: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            uri: uri.into(),
        }
    }
}

/// Field of a new media object
#[derive(Debug, Clone)]
pub struct NewMediaField {
    /// Machine name of the field
    pub name: String,
    /// Declared field type (`file`, `image`, `string`, ...)
    pub field_type: String,
    /// Referenced file, for file and image fields
    pub file_id: Option<i64>,
}

impl NewMediaField {
    /// Field holding a reference to a managed file
    pub fn file_ref(name: impl Into<String>, field_type: impl Into<String>, file_id: i64) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            file_id: Some(file_id),
        }
    }

    /// Field that holds no file reference
    pub fn plain(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            file_id: None,
        }
    }
}

/// Content record row
#[derive(Debug, Clone, FromRow)]
pub struct Record {
    /// Unique database ID
    pub id: i64,
    /// Record title
    pub title: String,
    /// Creation timestamp (Unix seconds)
    pub created_at: i64,
}

/// Main database handle
pub struct Database {
    pool: SqlitePool,
}
