//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the bulk-media-download REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the bulk-media-download REST API
///
/// Served as JSON at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bulk-media-download REST API",
        version = "0.1.0",
        description = "Select records in bulk and download the files they reference as one zip archive",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Actions
        crate::api::routes::bulk_download_action,

        // Download
        crate::api::routes::download_zip,

        // Configuration
        crate::api::routes::get_config,
        crate::api::routes::update_mapping,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::get_messages,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::RecordId,
        crate::types::FieldType,
        crate::types::FieldMappingRule,
        crate::types::SelectionRecord,
        crate::types::ResolvedFileEntry,
        crate::types::WarningReason,
        crate::types::ResolutionWarning,
        crate::types::NoticeLevel,
        crate::types::Notice,

        // Archive results
        crate::archive::SkipReason,
        crate::archive::SkippedEntry,

        // Config types from config.rs
        crate::config::Config,
        crate::config::MappingRow,
        crate::config::MappingIssue,
        crate::config::DownloadConfig,
        crate::config::PersistenceConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,

        // API request/response types
        crate::selection::BulkActionOutcome,
        crate::api::routes::BulkActionRequest,
        crate::api::routes::UpdateMappingRequest,
        crate::api::routes::UpdateMappingResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "actions", description = "Bulk actions - Select records for download"),
        (name = "download", description = "Download - Stream the selected files as one zip archive"),
        (name = "config", description = "Configuration - Inspect settings and edit the field mapping"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, session messages"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(super::auth::API_KEY_HEADER),
                    ),
                ),
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/actions/bulk-download",
            "/download/zip",
            "/config",
            "/config/mapping",
            "/health",
            "/openapi.json",
            "/messages",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn spec_has_domain_schemas() {
        let components = ApiDoc::openapi().components.unwrap();
        for schema in ["MappingRow", "Notice", "BulkActionOutcome", "ApiError"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn spec_has_tags() {
        let tags = ApiDoc::openapi().tags.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["actions", "download", "config", "system"]);
    }

    #[test]
    fn spec_declares_api_key_scheme() {
        let components = ApiDoc::openapi().components.unwrap();
        assert!(components.security_schemes.contains_key("api_key"));
    }

    #[test]
    fn spec_info() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "bulk-media-download REST API");
        assert!(spec.info.description.is_some());
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(json["paths"]["/download/zip"]["get"].is_object());
    }
}
