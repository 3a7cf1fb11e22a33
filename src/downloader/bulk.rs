//! Bulk action handling and download preparation.

use crate::archive::{ArchiveJob, SkipReason, assemble_with_timeout};
use crate::config::MappingIssue;
use crate::delivery::{TempArchive, archive_response};
use crate::error::{Error, Result};
use crate::resolver::ContentResolver;
use crate::selection::{BulkActionOutcome, SelectionTrigger};
use crate::types::{Notice, RecordId, ResolutionWarning};
use crate::utils::unique_archive_path;
use axum::response::Response;

use super::BulkDownloader;

/// An archive that has been written and is ready to stream
///
/// Dropping this without sending it deletes the archive.
#[derive(Debug)]
pub struct PreparedDownload {
    /// The written archive
    pub job: ArchiveJob,
    /// Owner of the temporary file
    pub guard: TempArchive,
    /// Filename offered to the client
    pub filename: String,
    /// Problems found while resolving the selection
    pub warnings: Vec<ResolutionWarning>,
}

impl PreparedDownload {
    /// Turn the archive into a streaming response; the file is deleted once
    /// the response body is gone
    pub async fn into_response(self) -> Result<Response> {
        archive_response(&self.job, self.guard, &self.filename).await
    }
}

/// The notice an operator sees when a download could not be produced
///
/// Only configuration problems are explained; anything else gets a generic
/// message so internal paths and errors stay in the logs.
pub fn failure_notice(error: &Error) -> Notice {
    match error {
        Error::ConfigurationMissing => {
            Notice::error("No fields are selected, please select them from the config form.")
        }
        Error::MissingViewConfiguration => {
            Notice::error("No view is configured to return to after the bulk action.")
        }
        _ => Notice::error("The download could not be prepared. Please try again later."),
    }
}

fn mapping_issue_notice(issue: &MappingIssue) -> Notice {
    Notice::warning(format!(
        "Ignoring field {} in mapping row {}: unknown field type \"{}\"",
        issue.field_name,
        issue.row + 1,
        issue.field_type
    ))
}

impl BulkDownloader {
    /// Record a bulk selection for a session
    ///
    /// Stores the ids (replacing any earlier selection), queues the download
    /// notice, and returns where to send the operator next. Fails with
    /// [`Error::MissingViewConfiguration`] when the first mapping row has no
    /// view; the selection is kept in that case.
    pub async fn bulk_action(
        &self,
        session_id: &str,
        record_ids: Vec<RecordId>,
    ) -> Result<BulkActionOutcome> {
        let config = self.get_config().await;
        SelectionTrigger::new(self.session(session_id), &config)
            .run(record_ids)
            .await
    }

    /// Resolve the session's selection and write the archive
    ///
    /// Resolution warnings, ignored mapping rows and unreadable sources are
    /// queued as notices for the session. Fails with
    /// [`Error::ConfigurationMissing`] before touching the selection when no
    /// mapping rule is usable.
    pub async fn prepare_download(&self, session_id: &str) -> Result<PreparedDownload> {
        let config = self.get_config().await;
        let mapping = config.mapping_rules();

        if mapping.rules.is_empty() {
            tracing::warn!(
                session_id,
                ignored_rows = mapping.issues.len(),
                "download requested without usable field mapping"
            );
            return Err(Error::ConfigurationMissing);
        }

        let store = self.session(session_id);
        let selection = store.selection().await?;

        let resolution = ContentResolver::new(self.db.as_ref(), &config.download)
            .resolve(&selection.record_ids, &mapping.rules)
            .await?;

        let destination = unique_archive_path(&config.download.temp_dir, &config.download.zip_filename);
        let guard = TempArchive::new(&destination);

        let job = assemble_with_timeout(
            resolution.entries,
            destination,
            config.download.archive_write_timeout,
        )
        .await?;

        let notices: Vec<Notice> = mapping
            .issues
            .iter()
            .map(mapping_issue_notice)
            .chain(resolution.warnings.iter().map(Notice::from))
            .chain(job.skipped.iter().filter_map(|skipped| match &skipped.reason {
                SkipReason::EntrySourceUnavailable { .. } => Some(Notice::warning(format!(
                    "Skipped {}: the file could not be read",
                    skipped.entry_name
                ))),
                SkipReason::Superseded => None,
            }))
            .collect();
        store.push_notices(notices).await?;

        tracing::info!(
            session_id,
            records = selection.record_ids.len(),
            entries = job.written(),
            warnings = resolution.warnings.len(),
            size_bytes = job.size_bytes,
            "download prepared"
        );

        Ok(PreparedDownload {
            job,
            guard,
            filename: config.download.zip_filename.clone(),
            warnings: resolution.warnings,
        })
    }

    /// Prepare the session's download and build the streaming response
    pub async fn download(&self, session_id: &str) -> Result<Response> {
        self.prepare_download(session_id).await?.into_response().await
    }

    /// Queue the user-facing notice for a failed download or action
    pub async fn report_failure(&self, session_id: &str, error: &Error) -> Result<()> {
        self.session(session_id)
            .push_notice(failure_notice(error))
            .await
    }
}
