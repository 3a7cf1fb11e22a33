//! Archive assembly
//!
//! Writes resolved entries into a single flat zip file. Entry sources that
//! cannot be opened are skipped and reported; failing to write the archive
//! itself, or a source failing part-way through its copy, is fatal.

use crate::error::{Error, Result};
use crate::types::ResolvedFileEntry;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Copy buffer size; cancellation is checked between chunks
const COPY_CHUNK: usize = 64 * 1024;

/// Sources at or above this size need zip64 headers
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Why an entry did not make it into the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The source file could not be opened
    EntrySourceUnavailable {
        /// Underlying I/O error
        error: String,
    },
    /// A later readable entry with the same name replaced this one
    Superseded,
}

/// An entry that was left out of the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SkippedEntry {
    /// Name the entry would have had in the archive
    pub entry_name: String,
    /// Source the entry would have been read from
    #[schema(value_type = String)]
    pub source_path: PathBuf,
    /// Why it was left out
    pub reason: SkipReason,
}

/// A written archive waiting to be delivered
///
/// The file at `destination_path` belongs to the request that built it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveJob {
    /// Entries the archive was built from
    pub entries: Vec<ResolvedFileEntry>,
    /// Location of the written archive
    pub destination_path: PathBuf,
    /// Final archive size in bytes
    pub size_bytes: u64,
    /// Entries that were not written
    pub skipped: Vec<SkippedEntry>,
}

impl ArchiveJob {
    /// Number of entries actually present in the archive
    pub fn written(&self) -> usize {
        self.entries.len().saturating_sub(self.skipped.len())
    }
}

/// Write `entries` into a zip at `destination`, replacing any existing file
///
/// Returns the finished job with the archive's size in bytes. Duplicate
/// entry names collapse to the last readable entry, which keeps the position
/// of the name's first occurrence.
pub fn assemble(entries: &[ResolvedFileEntry], destination: &Path) -> Result<ArchiveJob> {
    write_archive(entries, destination, &AtomicBool::new(false))
}

/// [`assemble`] on the blocking pool, bounded by `timeout`
///
/// On timeout the writer is told to stop and removes its partial output. If
/// the writer gets past its last cancellation check anyway, the archive it
/// produces is deleted as soon as the task finishes.
pub async fn assemble_with_timeout(
    entries: Vec<ResolvedFileEntry>,
    destination: PathBuf,
    timeout: Duration,
) -> Result<ArchiveJob> {
    let cancel = Arc::new(AtomicBool::new(false));
    let task_cancel = Arc::clone(&cancel);
    let task_destination = destination.clone();

    let mut task =
        spawn_blocking(move || write_archive(&entries, &task_destination, &task_cancel));

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(Error::ArchiveWrite {
            path: destination,
            reason: format!("archive task panicked: {}", e),
        }),
        Err(_) => {
            cancel.store(true, Ordering::SeqCst);
            warn!(path = ?destination, ?timeout, "archive write timed out");
            tokio::spawn(discard_late_archive(task));
            Err(Error::ArchiveWrite {
                path: destination,
                reason: format!("timed out after {}s", timeout.as_secs()),
            })
        }
    }
}

/// Wait for an abandoned writer and delete whatever it managed to finish
async fn discard_late_archive(task: JoinHandle<Result<ArchiveJob>>) {
    if let Ok(Ok(job)) = task.await {
        match tokio::fs::remove_file(&job.destination_path).await {
            Ok(()) => debug!(path = ?job.destination_path, "removed archive finished after timeout"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = ?job.destination_path, error = %e, "failed to remove late archive")
            }
        }
    }
}

fn write_archive(
    entries: &[ResolvedFileEntry],
    destination: &Path,
    cancel: &AtomicBool,
) -> Result<ArchiveJob> {
    let (plan, mut skipped) = plan_entries(entries);

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(destination, e))?;
    }

    if cancel.load(Ordering::SeqCst) {
        return Err(cancelled(destination));
    }

    let file = File::create(destination).map_err(|e| write_error(destination, e))?;

    let written = write_entries(file, &plan, &mut skipped, cancel, open_source)
        .and_then(|mut file| {
            file.flush()
                .map_err(|e| format!("failed to flush archive: {}", e))
        });
    if let Err(reason) = written {
        discard_partial(destination);
        return Err(Error::ArchiveWrite {
            path: destination.to_path_buf(),
            reason,
        });
    }

    let size_bytes = finished_size(destination, cancel)?;

    info!(
        path = ?destination,
        entries = entries.len() - skipped.len(),
        skipped = skipped.len(),
        size_bytes,
        "archive written"
    );

    Ok(ArchiveJob {
        entries: entries.to_vec(),
        destination_path: destination.to_path_buf(),
        size_bytes,
        skipped,
    })
}

/// Size of a finished archive, unless the request gave up on it meanwhile
///
/// A cancellation that arrives after the last entry check still wins: the
/// file is removed so nothing outlives the request.
fn finished_size(destination: &Path, cancel: &AtomicBool) -> Result<u64> {
    if cancel.load(Ordering::SeqCst) {
        discard_partial(destination);
        return Err(cancelled(destination));
    }

    Ok(std::fs::metadata(destination)
        .map_err(|e| write_error(destination, e))?
        .len())
}

fn discard_partial(destination: &Path) {
    if let Err(e) = std::fs::remove_file(destination) {
        warn!(path = ?destination, error = %e, "failed to remove partial archive");
    }
}

fn cancelled(destination: &Path) -> Error {
    Error::ArchiveWrite {
        path: destination.to_path_buf(),
        reason: "cancelled".to_string(),
    }
}

/// Open an entry source along with its length
fn open_source(path: &Path) -> std::io::Result<(File, u64)> {
    let source = File::open(path)?;
    let len = source.metadata()?.len();
    Ok((source, len))
}

/// Pick the entry that wins for each name
///
/// Only entries whose source can be opened compete; unreadable ones are
/// skipped up front so they cannot displace an earlier readable entry.
fn plan_entries(entries: &[ResolvedFileEntry]) -> (Vec<&ResolvedFileEntry>, Vec<SkippedEntry>) {
    let mut plan: Vec<&ResolvedFileEntry> = Vec::with_capacity(entries.len());
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    let mut skipped = Vec::new();

    for entry in entries {
        if let Err(e) = File::open(&entry.source_path) {
            warn!(entry = %entry.entry_name, path = ?entry.source_path, error = %e, "entry source unavailable, skipping");
            skipped.push(SkippedEntry {
                entry_name: entry.entry_name.clone(),
                source_path: entry.source_path.clone(),
                reason: SkipReason::EntrySourceUnavailable {
                    error: e.to_string(),
                },
            });
            continue;
        }

        match by_name.get(entry.entry_name.as_str()) {
            Some(&slot) => {
                debug!(entry = %entry.entry_name, "duplicate entry name, keeping the later source");
                let replaced = std::mem::replace(&mut plan[slot], entry);
                skipped.push(SkippedEntry {
                    entry_name: replaced.entry_name.clone(),
                    source_path: replaced.source_path.clone(),
                    reason: SkipReason::Superseded,
                });
            }
            None => {
                by_name.insert(entry.entry_name.as_str(), plan.len());
                plan.push(entry);
            }
        }
    }

    (plan, skipped)
}

/// Write planned entries and return the finished sink
///
/// The error string becomes the `ArchiveWrite` reason. A source that cannot
/// be opened is skipped. Once an entry is started it cannot be taken back
/// out of the archive, so a source that fails part-way through is fatal.
fn write_entries<W, R, O>(
    sink: W,
    plan: &[&ResolvedFileEntry],
    skipped: &mut Vec<SkippedEntry>,
    cancel: &AtomicBool,
    open: O,
) -> std::result::Result<W, String>
where
    W: Write + Seek,
    R: Read,
    O: Fn(&Path) -> std::io::Result<(R, u64)>,
{
    let mut writer = zip::ZipWriter::new(sink);
    let mut buf = vec![0u8; COPY_CHUNK];

    for entry in plan {
        if cancel.load(Ordering::SeqCst) {
            return Err("cancelled".to_string());
        }

        // The source was readable while planning but may have gone since
        let (mut source, len) = match open(&entry.source_path) {
            Ok(opened) => opened,
            Err(e) => {
                warn!(entry = %entry.entry_name, path = ?entry.source_path, error = %e, "entry source unavailable, skipping");
                skipped.push(SkippedEntry {
                    entry_name: entry.entry_name.clone(),
                    source_path: entry.source_path.clone(),
                    reason: SkipReason::EntrySourceUnavailable {
                        error: e.to_string(),
                    },
                });
                continue;
            }
        };

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(len >= LARGE_FILE_THRESHOLD);

        writer
            .start_file(entry.entry_name.as_str(), options)
            .map_err(|e| format!("failed to start entry {}: {}", entry.entry_name, e))?;

        match copy_entry(&mut source, &mut writer, &mut buf, cancel) {
            Ok(()) => debug!(entry = %entry.entry_name, "entry written"),
            Err(CopyError::Source(e)) => {
                return Err(format!(
                    "source of entry {} failed mid-copy: {}",
                    entry.entry_name, e
                ));
            }
            Err(CopyError::Archive(e)) => {
                return Err(format!("failed to write entry {}: {}", entry.entry_name, e));
            }
            Err(CopyError::Cancelled) => return Err("cancelled".to_string()),
        }
    }

    writer
        .finish()
        .map_err(|e| format!("failed to finish archive: {}", e))
}

enum CopyError {
    Source(std::io::Error),
    Archive(std::io::Error),
    Cancelled,
}

fn copy_entry<R: Read, W: Write + Seek>(
    source: &mut R,
    writer: &mut zip::ZipWriter<W>,
    buf: &mut [u8],
    cancel: &AtomicBool,
) -> std::result::Result<(), CopyError> {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Err(CopyError::Cancelled);
        }
        let read = match source.read(buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Source(e)),
        };
        writer
            .write_all(&buf[..read])
            .map_err(CopyError::Archive)?;
    }
}

fn write_error(destination: &Path, e: std::io::Error) -> Error {
    Error::ArchiveWrite {
        path: destination.to_path_buf(),
        reason: e.to_string(),
    }
}
