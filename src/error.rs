//! Error types for bulk-media-download
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (configuration, archive, database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Per-item resolution problems (a missing field, an unresolvable file) are
//! not errors: they are collected as [`ResolutionWarning`](crate::types::ResolutionWarning)
//! values and never abort a batch. Only the variants below stop an operation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for bulk-media-download operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-media-download
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "temp_dir")
        key: Option<String>,
    },

    /// No field mapping rules are configured, so nothing can be resolved
    #[error("no fields are selected, please select them from the configuration")]
    ConfigurationMissing,

    /// No view is configured to redirect back to after a bulk action
    #[error("no view is configured to return to after the bulk action")]
    MissingViewConfiguration,

    /// The archive could not be written to its destination
    #[error("failed to write archive {path}: {reason}")]
    ArchiveWrite {
        /// Destination path of the archive
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "archive_write_failed",
///     "message": "failed to write archive /tmp/x.zip: permission denied",
///     "details": {
///       "path": "/tmp/x.zip"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "configuration_missing")
    pub code: String,

    /// Human-readable error message, suitable for end users
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,

            // 409 Conflict - the site is not set up for the requested operation
            Error::ConfigurationMissing => 409,
            Error::MissingViewConfiguration => 409,

            // 500 Internal Server Error
            Error::ArchiveWrite { .. } => 500,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::ConfigurationMissing => "configuration_missing",
            Error::MissingViewConfiguration => "missing_view_configuration",
            Error::ArchiveWrite { .. } => "archive_write_failed",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::ArchiveWrite { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
