//! # bulk-media-download
//!
//! Bulk download of the files attached to selected content records.
//!
//! An operator selects records and triggers a bulk action; the selection is
//! stored in their session. Visiting the download route then resolves the
//! configured file and media fields of every selected record to files on
//! disk, writes them into one zip archive, streams it back as an attachment
//! and deletes the temporary archive once the response is done.
//!
//! ## Pipeline
//!
//! - [`selection`] stores the selection and queues the download notice
//! - [`resolver`] turns records plus the field mapping into archive entries
//! - [`archive`] writes the zip in a blocking task
//! - [`delivery`] streams it and removes the file afterwards
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_media_download::{BulkDownloader, Config, config::MappingRow, types::RecordId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         field_mapping: vec![MappingRow::new("field_image", "media").with_view("galleries")],
//!         ..Default::default()
//!     };
//!
//!     let downloader = BulkDownloader::new(config).await?;
//!
//!     let outcome = downloader
//!         .bulk_action("session-1", vec![RecordId(1), RecordId(2)])
//!         .await?;
//!     println!("redirecting to {}", outcome.redirect);
//!
//!     let prepared = downloader.prepare_download("session-1").await?;
//!     println!("archive at {}", prepared.job.destination_path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Zip archive assembly
pub mod archive;
/// Configuration types
pub mod config;
/// Content model and storage access
pub mod content;
/// Database persistence layer
pub mod db;
/// Streaming delivery and temp file cleanup
pub mod delivery;
/// Service facade (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Field resolution
pub mod resolver;
/// Session selection store and bulk action trigger
pub mod selection;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, MappingRow};
pub use db::Database;
pub use downloader::BulkDownloader;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use types::{
    FieldMappingRule, FieldType, Notice, NoticeLevel, RecordId, ResolutionWarning,
    ResolvedFileEntry, SelectionRecord,
};

/// Run the downloader until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bulk_media_download::{BulkDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = BulkDownloader::new(Config::default()).await?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BulkDownloader) -> Result<()> {
    shutdown_signal().await;
    downloader.shutdown().await
}

/// Resolves once SIGTERM or SIGINT (Ctrl+C elsewhere) is received
///
/// Suitable as the graceful-shutdown future for
/// [`api::serve_with_shutdown`].
pub async fn shutdown_signal() {
    wait_for_signal().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
