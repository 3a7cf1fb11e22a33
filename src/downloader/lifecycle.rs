//! Startup sweeps, the periodic session sweeper and shutdown.

use crate::error::Result;
use crate::utils::is_temp_archive;
use std::time::Duration;

use super::BulkDownloader;

/// Longest pause between two idle-session sweeps
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

impl BulkDownloader {
    /// Remove temporary archives left behind by an earlier process
    ///
    /// Archives are normally deleted as soon as their response is gone; any
    /// that survive a crash would otherwise pile up. Only files carrying the
    /// temporary archive prefix are touched. Returns how many were removed.
    pub async fn sweep_stale_archives(&self) -> usize {
        let temp_dir = &self.config.download.temp_dir;
        let mut entries = match tokio::fs::read_dir(temp_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(?temp_dir, error = %e, "Could not scan temp directory for stale archives");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(?temp_dir, error = %e, "Error while scanning temp directory");
                    break;
                }
            };

            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !is_temp_archive(&path) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(?path, "Removed stale archive");
                    removed += 1;
                }
                Err(e) => tracing::warn!(?path, error = %e, "Failed to remove stale archive"),
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Removed stale archives from a previous run");
        }
        removed
    }

    /// Delete session values untouched for longer than `session_idle_timeout`
    ///
    /// Failures are logged, not returned; the next sweep retries. Returns how
    /// many values were removed.
    pub async fn sweep_idle_sessions(&self) -> u64 {
        let idle = self.config.persistence.session_idle_timeout;
        let idle_secs = i64::try_from(idle.as_secs()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp().saturating_sub(idle_secs);

        match self.db.session_expire_idle(cutoff).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, idle_secs, "Expired idle session values");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to expire idle sessions");
                0
            }
        }
    }

    /// Spawn a background task that expires idle sessions periodically
    ///
    /// Runs every `session_idle_timeout` or every 15 minutes, whichever is
    /// shorter. Abort the returned handle to stop it.
    pub fn start_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let period = self
            .config
            .persistence
            .session_idle_timeout
            .min(SESSION_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately and startup already swept
            interval.tick().await;

            loop {
                interval.tick().await;
                downloader.sweep_idle_sessions().await;
            }
        })
    }

    /// Gracefully shut down the service
    ///
    /// In-flight downloads keep their own archive guards and clean up when
    /// their responses finish. This sweeps whatever is left in the temp
    /// directory, expires idle sessions and closes the database pool.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.sweep_stale_archives().await;
        self.sweep_idle_sessions().await;
        self.db.pool().close().await;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
