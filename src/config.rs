//! Configuration types for bulk-media-download

use crate::error::{Error, Result};
use crate::types::{FieldMappingRule, FieldType};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::{collections::HashMap, net::SocketAddr, time::Duration};
use tracing::warn;
use utoipa::ToSchema;

/// View used when recording a selection and no view is configured
pub const DEFAULT_VIEW: &str = "default_view";

/// One row of the field-mapping table, as maintained by the settings form
///
/// Rows are stored exactly as submitted: the form keeps a blank placeholder
/// row around, and the field type is free text. [`Config::mapping_rules`]
/// turns rows into validated [`FieldMappingRule`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MappingRow {
    /// View the rule was configured for (only the first row's view is used for redirects)
    #[serde(default)]
    pub view: Option<String>,

    /// Field type: "file" or "media"
    #[serde(default)]
    pub field_type: String,

    /// Machine name of the record field
    #[serde(default)]
    pub field_name: String,
}

impl MappingRow {
    /// Create a row without a view
    pub fn new(field_name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            view: None,
            field_type: field_type.into(),
            field_name: field_name.into(),
        }
    }

    /// Attach a view to this row
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }
}

/// A mapping row that was ignored while building the rule list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct MappingIssue {
    /// Position of the row in the table
    pub row: usize,
    /// Field name as configured
    pub field_name: String,
    /// Field type as configured
    pub field_type: String,
}

/// Validated mapping rules plus the rows that were skipped
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingRules {
    /// Rules in table order
    pub rules: Vec<FieldMappingRule>,
    /// Rows naming a field with an unrecognized field type
    pub issues: Vec<MappingIssue>,
}

/// Archive and delivery behaviour
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Filename offered to the browser (default: "Download.zip")
    #[serde(default = "default_zip_filename")]
    pub zip_filename: String,

    /// Directory archives are assembled in before delivery (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Upper bound for writing one archive (default: 300 seconds)
    #[serde(default = "default_archive_write_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub archive_write_timeout: Duration,

    /// How many records are resolved concurrently (default: 4)
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Redirect target pattern for the originating view; `{view}` is replaced
    /// by the view id (default: "/view/{view}/page_1")
    #[serde(default = "default_view_route_pattern")]
    pub view_route_pattern: String,

    /// Path the download endpoint is served at (default: "/download/zip")
    #[serde(default = "default_download_route")]
    pub download_route: String,

    /// Base directories for file URI schemes such as `public://`
    ///
    /// `temporary://` falls back to `temp_dir` when not listed.
    #[serde(default = "default_stream_wrappers")]
    pub stream_wrappers: HashMap<String, PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            zip_filename: default_zip_filename(),
            temp_dir: default_temp_dir(),
            archive_write_timeout: default_archive_write_timeout(),
            resolve_concurrency: default_resolve_concurrency(),
            view_route_pattern: default_view_route_pattern(),
            download_route: default_download_route(),
            stream_wrappers: default_stream_wrappers(),
        }
    }
}

impl DownloadConfig {
    /// Resolve a stored file URI to a location on disk
    ///
    /// `scheme://target` URIs are resolved against the configured stream
    /// wrapper directories; anything without a scheme is taken as a plain
    /// path. Returns `None` for unknown schemes and for targets that try to
    /// climb out of their wrapper directory.
    pub fn resolve_file_uri(&self, uri: &str) -> Option<PathBuf> {
        let Some((scheme, target)) = uri.split_once("://") else {
            return Some(PathBuf::from(uri));
        };

        let base = match self.stream_wrappers.get(scheme) {
            Some(base) => base.clone(),
            None if scheme == "temporary" => self.temp_dir.clone(),
            None => return None,
        };

        let target = Path::new(target);
        let escapes = target
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }

        Some(base.join(target))
    }

    /// Redirect target for a view id
    pub fn view_route(&self, view: &str) -> String {
        self.view_route_pattern.replace("{view}", view)
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./bulk-media-download.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Sessions untouched for this long are deleted (default: 86400 seconds)
    #[serde(default = "default_session_idle_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub session_idle_timeout: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            session_idle_timeout: default_session_idle_timeout(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key for the administrative endpoints
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: false)
    #[serde(default)]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: false,
            cors_origins: default_cors_origins(),
        }
    }
}

/// [`ApiConfig`] fields that are rejected at the top level of a config file
const MISPLACED_API_KEYS: &[&str] = &["api_key", "bind_address", "cors_enabled", "cors_origins"];

/// Main configuration
///
/// The download settings are flattened so the JSON file stays a single
/// level deep apart from `persistence` and `api`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Field-mapping table, in the order rows were configured
    #[serde(default)]
    pub field_mapping: Vec<MappingRow>,

    /// Archive and delivery settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            Error::Config { message, key } => Error::Config {
                message: format!("{}: {}", path.display(), message),
                key,
            },
            other => other,
        })
    }

    /// Parse and validate configuration JSON
    ///
    /// API settings belong in the nested `api` object. Finding one at the
    /// top level is an error, since serde would otherwise drop it and leave
    /// the administrative routes without a key.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| Error::Config {
            message: format!("failed to parse configuration: {}", e),
            key: None,
        })?;

        if let Some(key) = MISPLACED_API_KEYS
            .iter()
            .find(|key| value.get(**key).is_some())
        {
            return Err(Error::Config {
                message: format!("{} must be set inside the \"api\" object", key),
                key: Some((*key).to_string()),
            });
        }

        let config: Config = serde_json::from_value(value).map_err(|e| Error::Config {
            message: format!("failed to parse configuration: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot enforce
    pub fn validate(&self) -> Result<()> {
        let filename = self.download.zip_filename.trim();
        if filename.is_empty() || filename.contains(['/', '\\', '"']) {
            return Err(Error::Config {
                message: format!(
                    "zip_filename must be a plain file name, got {:?}",
                    self.download.zip_filename
                ),
                key: Some("zip_filename".to_string()),
            });
        }

        if !self.download.download_route.starts_with('/') {
            return Err(Error::Config {
                message: format!(
                    "download_route must start with '/', got {:?}",
                    self.download.download_route
                ),
                key: Some("download_route".to_string()),
            });
        }

        if self.download.resolve_concurrency == 0 {
            return Err(Error::Config {
                message: "resolve_concurrency must be at least 1".to_string(),
                key: Some("resolve_concurrency".to_string()),
            });
        }

        if self.download.archive_write_timeout.is_zero() {
            return Err(Error::Config {
                message: "archive_write_timeout must be greater than zero".to_string(),
                key: Some("archive_write_timeout".to_string()),
            });
        }

        if self.persistence.session_idle_timeout.is_zero() {
            return Err(Error::Config {
                message: "session_idle_timeout must be greater than zero".to_string(),
                key: Some("session_idle_timeout".to_string()),
            });
        }

        Ok(())
    }

    /// Turn the mapping table into validated rules
    ///
    /// Rows with an empty field name are placeholders and are dropped
    /// silently. Rows with an unrecognized field type are dropped with a
    /// warning and reported in [`MappingRules::issues`].
    pub fn mapping_rules(&self) -> MappingRules {
        let mut mapping = MappingRules::default();

        for (row, entry) in self.field_mapping.iter().enumerate() {
            let field_name = entry.field_name.trim();
            if field_name.is_empty() {
                continue;
            }

            match FieldType::parse(&entry.field_type) {
                Some(field_type) => mapping
                    .rules
                    .push(FieldMappingRule::new(field_name, field_type)),
                None => {
                    warn!(
                        row,
                        field_name,
                        field_type = %entry.field_type,
                        "ignoring mapping row with unknown field type"
                    );
                    mapping.issues.push(MappingIssue {
                        row,
                        field_name: field_name.to_string(),
                        field_type: entry.field_type.clone(),
                    });
                }
            }
        }

        mapping
    }

    /// View id stored alongside a selection (falls back to [`DEFAULT_VIEW`])
    pub fn selection_view(&self) -> String {
        self.redirect_view()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_VIEW.to_string())
    }

    /// View id to redirect to after a bulk action
    ///
    /// Only the first row of the table is consulted, whatever the number of
    /// configured rows.
    pub fn redirect_view(&self) -> Option<&str> {
        self.field_mapping
            .first()
            .and_then(|row| row.view.as_deref())
            .map(str::trim)
            .filter(|view| !view.is_empty())
    }
}

// Default value functions
fn default_zip_filename() -> String {
    "Download.zip".to_string()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_archive_write_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_resolve_concurrency() -> usize {
    4
}

fn default_view_route_pattern() -> String {
    "/view/{view}/page_1".to_string()
}

fn default_download_route() -> String {
    "/download/zip".to_string()
}

fn default_stream_wrappers() -> HashMap<String, PathBuf> {
    HashMap::from([
        ("public".to_string(), PathBuf::from("files")),
        ("private".to_string(), PathBuf::from("private")),
    ])
}

fn default_database_path() -> PathBuf {
    PathBuf::from("bulk-media-download.db")
}

fn default_session_idle_timeout() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.download.zip_filename, "Download.zip");
        assert_eq!(config.download.archive_write_timeout, Duration::from_secs(300));
        assert_eq!(config.download.resolve_concurrency, 4);
        assert_eq!(
            config.persistence.session_idle_timeout,
            Duration::from_secs(86400)
        );
        assert!(config.field_mapping.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download.zip_filename, "Download.zip");
        assert_eq!(config.download.download_route, "/download/zip");
        assert_eq!(
            config.server.api.bind_address,
            SocketAddr::from(([127, 0, 0, 1], 6790))
        );
    }

    #[test]
    fn json_round_trip_keeps_flattened_layout() {
        let json = r#"{
            "field_mapping": [
                {"view": "content_list", "field_type": "media", "field_name": "field_image"}
            ],
            "zip_filename": "Articles.zip",
            "archive_write_timeout": 30,
            "api": {"api_key": "secret"},
            "persistence": {"database_path": "/var/lib/bmd.db"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.download.zip_filename, "Articles.zip");
        assert_eq!(config.download.archive_write_timeout, Duration::from_secs(30));
        assert_eq!(config.server.api.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("/var/lib/bmd.db")
        );

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["zip_filename"], "Articles.zip");
        assert_eq!(value["archive_write_timeout"], 30);
        assert_eq!(value["api"]["api_key"], "secret");
    }

    #[test]
    fn from_json_reads_nested_api_settings() {
        let config =
            Config::from_json(r#"{"api": {"api_key": "secret", "cors_enabled": true}}"#).unwrap();
        assert_eq!(config.server.api.api_key.as_deref(), Some("secret"));
        assert!(config.server.api.cors_enabled);
    }

    #[test]
    fn from_json_rejects_top_level_api_settings() {
        for key in ["api_key", "bind_address", "cors_enabled", "cors_origins"] {
            let json = format!(r#"{{"{}": "x"}}"#, key);
            let err = Config::from_json(&json).unwrap_err();
            assert!(
                matches!(err, Error::Config { key: Some(ref k), .. } if k == key),
                "{key} at the top level should be rejected"
            );
        }
    }

    #[test]
    fn from_file_rejects_misplaced_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key": "secret"}"#).unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "api_key"));
    }

    #[test]
    fn mapping_rules_keep_order_and_skip_placeholders() {
        let config = Config {
            field_mapping: vec![
                MappingRow::new("field_docs", "file"),
                MappingRow::new("", ""),
                MappingRow::new("field_image", "media"),
            ],
            ..Default::default()
        };

        let mapping = config.mapping_rules();
        assert_eq!(
            mapping.rules,
            vec![
                FieldMappingRule::new("field_docs", FieldType::File),
                FieldMappingRule::new("field_image", FieldType::Media),
            ]
        );
        assert!(mapping.issues.is_empty());
    }

    #[test]
    fn unknown_field_type_is_reported_not_fatal() {
        let config = Config {
            field_mapping: vec![
                MappingRow::new("field_link", "link"),
                MappingRow::new("field_docs", "file"),
            ],
            ..Default::default()
        };

        let mapping = config.mapping_rules();
        assert_eq!(mapping.rules.len(), 1);
        assert_eq!(mapping.issues.len(), 1);
        assert_eq!(mapping.issues[0].row, 0);
        assert_eq!(mapping.issues[0].field_type, "link");
    }

    #[test]
    fn redirect_view_uses_first_row_only() {
        let config = Config {
            field_mapping: vec![
                MappingRow::new("field_docs", "file").with_view("articles"),
                MappingRow::new("field_image", "media").with_view("galleries"),
            ],
            ..Default::default()
        };
        assert_eq!(config.redirect_view(), Some("articles"));
        assert_eq!(config.selection_view(), "articles");
    }

    #[test]
    fn redirect_view_missing_when_first_row_has_none() {
        let config = Config {
            field_mapping: vec![
                MappingRow::new("field_docs", "file"),
                MappingRow::new("field_image", "media").with_view("galleries"),
            ],
            ..Default::default()
        };
        assert_eq!(config.redirect_view(), None);
        assert_eq!(config.selection_view(), DEFAULT_VIEW);
        assert_eq!(Config::default().redirect_view(), None);
    }

    #[test]
    fn validate_rejects_path_like_filename() {
        let mut config = Config::default();
        config.download.zip_filename = "../evil.zip".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "zip_filename"));
    }

    #[test]
    fn validate_rejects_relative_download_route() {
        let mut config = Config::default();
        config.download.download_route = "download/zip".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "download_route"));
    }

    #[test]
    fn session_idle_timeout_reads_seconds() {
        let config = Config::from_json(r#"{"persistence": {"session_idle_timeout": 600}}"#).unwrap();
        assert_eq!(
            config.persistence.session_idle_timeout,
            Duration::from_secs(600)
        );

        let err = Config::from_json(r#"{"persistence": {"session_idle_timeout": 0}}"#).unwrap_err();
        assert!(
            matches!(err, Error::Config { key: Some(ref k), .. } if k == "session_idle_timeout")
        );
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.download.resolve_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_file_uri_uses_stream_wrappers() {
        let mut download = DownloadConfig::default();
        download
            .stream_wrappers
            .insert("public".to_string(), PathBuf::from("/srv/files"));
        download.temp_dir = PathBuf::from("/tmp/bmd");

        assert_eq!(
            download.resolve_file_uri("public://2024/cat.png"),
            Some(PathBuf::from("/srv/files/2024/cat.png"))
        );
        assert_eq!(
            download.resolve_file_uri("temporary://upload.bin"),
            Some(PathBuf::from("/tmp/bmd/upload.bin"))
        );
        assert_eq!(
            download.resolve_file_uri("/abs/path/a.pdf"),
            Some(PathBuf::from("/abs/path/a.pdf"))
        );
        assert_eq!(download.resolve_file_uri("s3://bucket/key"), None);
        assert_eq!(download.resolve_file_uri("public://../etc/passwd"), None);
    }

    #[test]
    fn view_route_substitutes_view_id() {
        let download = DownloadConfig::default();
        assert_eq!(download.view_route("articles"), "/view/articles/page_1");
    }

    #[test]
    fn from_file_reports_parse_errors_as_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        std::fs::write(&path, r#"{"zip_filename": "Bundle.zip"}"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.download.zip_filename, "Bundle.zip");
    }
}
