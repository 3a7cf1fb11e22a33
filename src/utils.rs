//! Utility functions for identifiers and temporary paths

use rand::Rng;
use std::path::{Path, PathBuf};

/// Prefix of every temporary archive this crate writes
pub const ARCHIVE_PREFIX: &str = "bmd-";

/// Random lowercase hex token of `bytes` random bytes
///
/// # Examples
///
/// ```
/// use bulk_media_download::utils::random_token;
///
/// let token = random_token(16);
/// assert_eq!(token.len(), 32);
/// assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A fresh archive location inside `temp_dir`
///
/// The random prefix keeps concurrent requests from sharing a file; the
/// configured filename is kept as the suffix so the file is recognizable on
/// disk.
pub fn unique_archive_path(temp_dir: &Path, filename: &str) -> PathBuf {
    temp_dir.join(format!("{}{}-{}", ARCHIVE_PREFIX, random_token(8), filename))
}

/// Whether a file name looks like one of our temporary archives
pub fn is_temp_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(ARCHIVE_PREFIX))
}
