//! Content resolution
//!
//! Turns selected record ids plus the field-mapping rules into the ordered
//! list of files that go into the archive.
//!
//! `file` rules are read directly: every file the field references becomes
//! an entry. `media` rules take one extra hop: the field's media object is
//! loaded and each of its `file`/`image` sub-fields is resolved to a file.
//! Problems with individual fields or files are collected as
//! [`ResolutionWarning`]s; only storage failures abort a resolution.

use crate::config::DownloadConfig;
use crate::content::{ContentSource, FileObject};
use crate::error::Result;
use crate::types::{
    FieldMappingRule, FieldType, FileId, RecordId, Resolution, ResolutionWarning,
    ResolvedFileEntry, WarningReason,
};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, warn};

/// Resolves records to archive entries through a [`ContentSource`]
pub struct ContentResolver<'a, C: ContentSource + ?Sized> {
    source: &'a C,
    download: &'a DownloadConfig,
}

impl<'a, C: ContentSource + ?Sized> ContentResolver<'a, C> {
    /// Create a resolver reading from `source`
    ///
    /// `download` supplies the stream wrapper directories used to turn file
    /// URIs into paths, and the number of records resolved concurrently.
    pub fn new(source: &'a C, download: &'a DownloadConfig) -> Self {
        Self { source, download }
    }

    /// Resolve every record against every rule
    ///
    /// Entries come out in record order, then rule order, then field order,
    /// whatever order the concurrent record lookups finish in. Entry names
    /// are not deduplicated.
    pub async fn resolve(
        &self,
        record_ids: &[RecordId],
        rules: &[FieldMappingRule],
    ) -> Result<Resolution> {
        if record_ids.is_empty() || rules.is_empty() {
            debug!(
                records = record_ids.len(),
                rules = rules.len(),
                "nothing to resolve"
            );
            return Ok(Resolution::default());
        }

        let concurrency = self.download.resolve_concurrency.max(1);

        let mut per_record: Vec<(usize, Result<Resolution>)> =
            stream::iter(record_ids.iter().copied().enumerate())
                .map(|(index, record_id)| async move {
                    (index, self.resolve_record(record_id, rules).await)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        per_record.sort_by_key(|(index, _)| *index);

        let mut resolution = Resolution::default();
        for (_, result) in per_record {
            let record = result?;
            resolution.entries.extend(record.entries);
            resolution.warnings.extend(record.warnings);
        }

        info!(
            records = record_ids.len(),
            entries = resolution.entries.len(),
            warnings = resolution.warnings.len(),
            "resolved selection"
        );

        Ok(resolution)
    }

    /// Resolve a single record against all rules
    async fn resolve_record(
        &self,
        record_id: RecordId,
        rules: &[FieldMappingRule],
    ) -> Result<Resolution> {
        let mut out = Resolution::default();

        if !self.source.record_exists(record_id).await? {
            warn!(%record_id, "selected record no longer exists, skipping");
            return Ok(out);
        }

        for rule in rules {
            let Some(targets) = self
                .source
                .field_references(record_id, &rule.field_name)
                .await?
            else {
                warn!(%record_id, field_name = %rule.field_name, "record does not have the field");
                out.warnings.push(ResolutionWarning::new(
                    record_id,
                    &rule.field_name,
                    WarningReason::FieldNotFound,
                ));
                continue;
            };

            match rule.field_type {
                FieldType::File => {
                    self.resolve_file_field(record_id, rule, &targets, &mut out)
                        .await?
                }
                FieldType::Media => {
                    self.resolve_media_field(record_id, rule, &targets, &mut out)
                        .await?
                }
            }
        }

        Ok(out)
    }

    /// Every referenced file becomes an entry
    async fn resolve_file_field(
        &self,
        record_id: RecordId,
        rule: &FieldMappingRule,
        targets: &[i64],
        out: &mut Resolution,
    ) -> Result<()> {
        for &file_id in targets {
            match self.resolve_file(file_id).await? {
                Some(entry) => {
                    debug!(%record_id, field_name = %rule.field_name, entry = %entry.entry_name, "resolved file");
                    out.entries.push(entry);
                }
                None => {
                    warn!(%record_id, field_name = %rule.field_name, file_id, "failed to resolve file from file field");
                    out.warnings.push(ResolutionWarning::new(
                        record_id,
                        &rule.field_name,
                        WarningReason::FileUnresolvable {
                            file_id: Some(file_id),
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    /// The field's first media object is opened and its file/image
    /// sub-fields become entries
    ///
    /// An empty field or a dangling media reference is skipped without a
    /// warning; media fields are optional per record.
    async fn resolve_media_field(
        &self,
        record_id: RecordId,
        rule: &FieldMappingRule,
        targets: &[i64],
        out: &mut Resolution,
    ) -> Result<()> {
        let Some(&media_id) = targets.first() else {
            debug!(%record_id, field_name = %rule.field_name, "media field is empty");
            return Ok(());
        };

        let Some(media) = self.source.load_media(media_id).await? else {
            debug!(%record_id, field_name = %rule.field_name, media_id, "referenced media does not exist");
            return Ok(());
        };

        for field in media.fields.iter().filter(|field| field.holds_file()) {
            let entry = match field.file_id {
                Some(file_id) => self.resolve_file(file_id).await?,
                None => None,
            };

            match entry {
                Some(entry) => {
                    debug!(%record_id, media_id, media_field = %field.name, entry = %entry.entry_name, "resolved media file");
                    out.entries.push(entry);
                }
                None => {
                    warn!(%record_id, media_id, media_field = %field.name, "failed to resolve file from media field");
                    out.warnings.push(ResolutionWarning::new(
                        record_id,
                        &rule.field_name,
                        WarningReason::MediaUnresolvable {
                            media_field: field.name.clone(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    /// Load a file and check that its bytes exist on disk
    async fn resolve_file(&self, file_id: FileId) -> Result<Option<ResolvedFileEntry>> {
        let Some(file) = self.source.load_file(file_id).await? else {
            return Ok(None);
        };

        let Some(path) = self.download.resolve_file_uri(&file.uri) else {
            debug!(file_id, uri = %file.uri, "file URI has no known location");
            return Ok(None);
        };

        let source_path = match tokio::fs::canonicalize(&path).await {
            Ok(real) => real,
            Err(e) => {
                debug!(file_id, ?path, error = %e, "file is missing on disk");
                return Ok(None);
            }
        };

        match tokio::fs::metadata(&source_path).await {
            Ok(meta) if meta.is_file() => Ok(Some(ResolvedFileEntry {
                entry_name: entry_name(&file, &source_path),
                source_path,
            })),
            _ => Ok(None),
        }
    }
}

/// Flat entry name for a file: its stored filename without any directory part
fn entry_name(file: &FileObject, source_path: &Path) -> String {
    let stored = file
        .filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if !stored.is_empty() {
        return stored.to_string();
    }

    source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("file-{}", file.id))
}
