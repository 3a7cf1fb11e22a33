//! Per-session key/value storage.
//!
//! Values are opaque strings here; the typed API lives in
//! [`SessionStore`](crate::selection::SessionStore).

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Store a value under `key` for one session, replacing any previous value
    pub async fn session_set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO session_store (session_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set session value: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Read a session value
    pub async fn session_get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM session_store WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get session value: {}",
                e
            )))
        })?;

        Ok(value)
    }

    /// Delete a session value; deleting a missing key is not an error
    pub async fn session_delete(&self, session_id: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_store WHERE session_id = ? AND key = ?")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete session value: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Read and delete a session value in one transaction
    pub async fn session_take(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM session_store WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get session value: {}",
                e
            )))
        })?;

        if value.is_some() {
            sqlx::query("DELETE FROM session_store WHERE session_id = ? AND key = ?")
                .bind(session_id)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to delete session value: {}",
                        e
                    )))
                })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit session take: {}",
                e
            )))
        })?;

        Ok(value)
    }

    /// Read-modify-write one session value in a single transaction
    ///
    /// `update` receives the current value and returns the replacement, or
    /// `None` to leave the value untouched. Concurrent updates of the same
    /// key are serialized, so none of them is lost.
    pub async fn session_update<F>(&self, session_id: &str, key: &str, update: F) -> Result<()>
    where
        F: FnOnce(Option<&str>) -> Result<Option<String>>,
    {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        // Write before reading so the transaction holds the write lock
        // for the whole read-modify-write.
        sqlx::query(
            "UPDATE session_store SET updated_at = ? WHERE session_id = ? AND key = ?",
        )
        .bind(now)
        .bind(session_id)
        .bind(key)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to lock session value: {}",
                e
            )))
        })?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT value FROM session_store WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get session value: {}",
                e
            )))
        })?;

        let Some(value) = update(current.as_deref())? else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO session_store (session_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(&value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set session value: {}",
                e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit session update: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Drop every value of a session (called when the session ends)
    ///
    /// Returns the number of values removed.
    pub async fn session_clear(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_store WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear session: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Delete every session value last written before `cutoff` (Unix seconds)
    ///
    /// Returns the number of values removed.
    pub async fn session_expire_idle(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_store WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to expire idle sessions: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
