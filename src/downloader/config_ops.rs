//! Runtime configuration reads and field-mapping updates.

use crate::config::{Config, MappingIssue, MappingRow};

use super::BulkDownloader;

/// Placeholder shown instead of secrets
pub const REDACTED: &str = "***REDACTED***";

impl BulkDownloader {
    /// Get the current configuration
    ///
    /// Returns a snapshot: the static settings plus the field mapping as it
    /// stands right now. Later mapping updates do not affect the snapshot,
    /// so one request sees one consistent mapping from start to end.
    pub async fn get_config(&self) -> Config {
        let mut config = (*self.config).clone();
        config.field_mapping = self.field_mapping.read().await.clone();
        config
    }

    /// Current configuration with secrets replaced by a placeholder
    pub async fn get_redacted_config(&self) -> Config {
        let mut config = self.get_config().await;
        if config.server.api.api_key.is_some() {
            config.server.api.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Current field-mapping table, as configured
    pub async fn get_field_mapping(&self) -> Vec<MappingRow> {
        self.field_mapping.read().await.clone()
    }

    /// Replace the field-mapping table
    ///
    /// Rows are stored as given, including placeholder rows with an empty
    /// field name. Rows whose field type is not recognized are kept too but
    /// reported back, since they will be ignored when resolving.
    pub async fn update_field_mapping(&self, rows: Vec<MappingRow>) -> Vec<MappingIssue> {
        let candidate = Config {
            field_mapping: rows,
            ..Default::default()
        };
        let issues = candidate.mapping_rules().issues;

        let rows = candidate.field_mapping;
        let count = rows.len();
        *self.field_mapping.write().await = rows;

        tracing::info!(
            rows = count,
            ignored = issues.len(),
            "Field mapping updated"
        );

        issues
    }
}
