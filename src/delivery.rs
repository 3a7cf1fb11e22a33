//! Archive delivery and temporary file cleanup
//!
//! The archive file is owned by a [`TempArchive`] guard. The guard moves
//! into the response body stream, so the file is deleted when the body is
//! dropped: after the last byte is sent, when sending fails, or when the
//! response is discarded without being sent at all.

use crate::archive::ArchiveJob;
use crate::error::{Error, Result};
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Media type of the delivered archive
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Deletes a temporary archive file when dropped
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    /// Take ownership of the file at `path` (which need not exist yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the guarded file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed temporary archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove temporary archive"),
        }
    }
}

/// Build the streaming download response for a written archive
///
/// `guard` must own `job.destination_path`. If the archive cannot be opened
/// the guard is dropped here and the error returned.
pub async fn archive_response(job: &ArchiveJob, guard: TempArchive, filename: &str) -> Result<Response> {
    let file = tokio::fs::File::open(guard.path()).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| Error::Config {
            message: format!("zip filename is not a valid header value: {}", e),
            key: Some("zip_filename".to_string()),
        })?;

    // The closure owns the guard; dropping the body drops the closure
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _owner = &guard;
        chunk
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, ZIP_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, job.size_bytes)
        .header("Content-Description", "File Transfer")
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Other(format!("failed to build download response: {}", e)))?;

    debug!(
        path = ?job.destination_path,
        size_bytes = job.size_bytes,
        filename,
        "streaming archive"
    );

    Ok(response)
}
