//! Application state for the API server

use crate::{BulkDownloader, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the service instance and the startup configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main BulkDownloader instance
    pub downloader: Arc<BulkDownloader>,

    /// Configuration the server was started with (the live field mapping is
    /// read through the downloader)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<BulkDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
