//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`actions`] - Bulk actions on selected records
//! - [`download`] - Archive download
//! - [`config`] - Configuration and field mapping
//! - [`system`] - Health, OpenAPI, session messages

use crate::config::{MappingIssue, MappingRow};
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

mod actions;
mod config;
mod download;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use actions::*;
pub use config::*;
pub use download::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /actions/bulk-download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BulkActionRequest {
    /// Selected record ids, in selection order
    pub record_ids: Vec<RecordId>,
}

/// Request body for PUT /config/mapping
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateMappingRequest {
    /// The complete mapping table; replaces the current one
    pub field_mapping: Vec<MappingRow>,
}

/// Response body for PUT /config/mapping
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UpdateMappingResponse {
    /// The mapping table now in effect
    pub field_mapping: Vec<MappingRow>,
    /// Rows that will be ignored when resolving
    pub ignored: Vec<MappingIssue>,
}
