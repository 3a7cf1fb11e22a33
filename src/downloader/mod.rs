//! Bulk download service split into focused submodules.
//!
//! The `BulkDownloader` struct and its methods are organized by domain:
//! - [`bulk`] - Bulk action handling and download preparation
//! - [`config_ops`] - Runtime configuration reads and mapping updates
//! - [`lifecycle`] - Startup sweeps, session expiry and shutdown

mod bulk;
mod config_ops;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use bulk::{PreparedDownload, failure_notice};
pub use config_ops::REDACTED;

use crate::config::{Config, MappingRow};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::selection::SessionStore;
use std::sync::Arc;

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BulkDownloader {
    /// Database holding content and session state
    /// Public for integration tests to seed records and files
    pub db: Arc<Database>,
    /// Static configuration (wrapped in Arc for sharing across requests)
    pub(crate) config: Arc<Config>,
    /// Runtime-mutable field mapping (replaced through the settings API)
    pub(crate) field_mapping: Arc<tokio::sync::RwLock<Vec<MappingRow>>>,
}

impl BulkDownloader {
    /// Create a new BulkDownloader instance
    ///
    /// This validates the configuration, makes sure the temporary directory
    /// exists, opens (and migrates) the SQLite database, removes archives
    /// left behind by a previous run and expires idle sessions.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.temp_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        config.download.temp_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;

        let downloader = Self::with_database(config, Arc::new(db));
        downloader.sweep_stale_archives().await;
        downloader.sweep_idle_sessions().await;

        tracing::info!(
            rules = downloader.config.field_mapping.len(),
            temp_dir = ?downloader.config.download.temp_dir,
            "Bulk downloader initialized"
        );

        Ok(downloader)
    }

    /// Build a downloader around an already opened database
    pub fn with_database(config: Config, db: Arc<Database>) -> Self {
        let field_mapping = Arc::new(tokio::sync::RwLock::new(config.field_mapping.clone()));
        Self {
            db,
            config: Arc::new(config),
            field_mapping,
        }
    }

    /// Session store handle for one session
    pub fn session<'a>(&'a self, session_id: &'a str) -> SessionStore<'a> {
        SessionStore::new(&self.db, session_id)
    }
}
