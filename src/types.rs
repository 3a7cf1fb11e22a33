//! Core types for bulk-media-download

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Identifier of a media object
pub type MediaId = i64;

/// Identifier of a managed file
pub type FileId = i64;

/// Unique identifier for a content record
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Create a new RecordId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for RecordId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for RecordId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for RecordId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// How a mapped record field is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// The field references managed files directly
    File,
    /// The field references a media object that wraps files or images
    Media,
}

impl FieldType {
    /// Parse a configured field type; unknown kinds yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "file" => Some(FieldType::File),
            "media" => Some(FieldType::Media),
            _ => None,
        }
    }

    /// Configuration name of this field type
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::File => "file",
            FieldType::Media => "media",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated field mapping rule: which record field to harvest and how
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldMappingRule {
    /// Machine name of the record field (never empty)
    pub field_name: String,
    /// How the field's references are interpreted
    pub field_type: FieldType,
}

impl FieldMappingRule {
    /// Create a new mapping rule
    pub fn new(field_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
        }
    }
}

/// The selection captured from the most recent bulk action of a session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SelectionRecord {
    /// Selected record ids in selection order
    pub record_ids: Vec<RecordId>,
    /// View the operator selected the records from
    pub origin_view: Option<String>,
}

/// A file that will be written into the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedFileEntry {
    /// Resolved location of the file's bytes on disk
    #[schema(value_type = String)]
    pub source_path: PathBuf,
    /// Name of the entry inside the archive
    pub entry_name: String,
}

/// Why a record field produced no archive entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningReason {
    /// The record does not expose the configured field
    FieldNotFound,
    /// A file or image sub-field of the referenced media could not be resolved
    MediaUnresolvable {
        /// Name of the media sub-field that failed
        media_field: String,
    },
    /// A file referenced by the field could not be resolved to a real file
    FileUnresolvable {
        /// Referenced file id, if the reference carried one
        file_id: Option<FileId>,
    },
}

/// A non-fatal problem found while resolving a record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResolutionWarning {
    /// Record being resolved
    pub record_id: RecordId,
    /// Configured field the problem belongs to
    pub field_name: String,
    /// What went wrong
    pub reason: WarningReason,
}

impl ResolutionWarning {
    /// Create a new warning
    pub fn new(record_id: RecordId, field_name: impl Into<String>, reason: WarningReason) -> Self {
        Self {
            record_id,
            field_name: field_name.into(),
            reason,
        }
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            WarningReason::FieldNotFound => write!(
                f,
                "Record {} does not have the specified field: {}",
                self.record_id, self.field_name
            ),
            WarningReason::MediaUnresolvable { media_field } => write!(
                f,
                "Failed to get file from media field: {} (record {}, field {})",
                media_field, self.record_id, self.field_name
            ),
            WarningReason::FileUnresolvable { .. } => write!(
                f,
                "Failed to get file from file field: {} (record {})",
                self.field_name, self.record_id
            ),
        }
    }
}

/// Output of one resolution pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Resolution {
    /// Archive entries in deterministic order
    pub entries: Vec<ResolvedFileEntry>,
    /// Problems encountered along the way
    pub warnings: Vec<ResolutionWarning>,
}

/// Severity of a user-facing notice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational message
    Status,
    /// Something was skipped but the operation went ahead
    Warning,
    /// The operation did not complete
    Error,
}

/// A messenger-style notice shown to the operator on the next page view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text shown to the operator
    pub message: String,
    /// Link attached to the notice, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Notice {
    /// Informational notice
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Status,
            message: message.into(),
            link: None,
        }
    }

    /// Warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            link: None,
        }
    }

    /// Error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            link: None,
        }
    }

    /// Attach a link to the notice
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl From<&ResolutionWarning> for Notice {
    fn from(warning: &ResolutionWarning) -> Self {
        Notice::warning(warning.to_string())
    }
}
