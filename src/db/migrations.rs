//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::apply_migration(&mut conn, 1).await?;
        }
        if current_version < 2 {
            Self::apply_migration(&mut conn, 2).await?;
        }

        Ok(())
    }

    /// Run one migration inside a transaction and record it
    ///
    /// A failing migration is rolled back so a partial schema is never left
    /// behind.
    async fn apply_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            match version {
                1 => Self::migrate_v1(&mut *conn).await?,
                2 => Self::migrate_v2(&mut *conn).await?,
                other => {
                    return Err(Error::Database(DatabaseError::MigrationFailed(format!(
                        "Unknown migration version {}",
                        other
                    ))));
                }
            }
            Self::record_migration(&mut *conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Migration v1: content schema (records, files, media)
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        let statements = [
            (
                "records",
                r#"
                CREATE TABLE records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )
                "#,
            ),
            (
                "record_fields",
                r#"
                CREATE TABLE record_fields (
                    record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                    field_name TEXT NOT NULL,
                    PRIMARY KEY (record_id, field_name)
                )
                "#,
            ),
            (
                "record_field_items",
                r#"
                CREATE TABLE record_field_items (
                    record_id INTEGER NOT NULL,
                    field_name TEXT NOT NULL,
                    delta INTEGER NOT NULL,
                    target_id INTEGER NOT NULL,
                    PRIMARY KEY (record_id, field_name, delta),
                    FOREIGN KEY (record_id, field_name)
                        REFERENCES record_fields(record_id, field_name) ON DELETE CASCADE
                )
                "#,
            ),
            (
                "files",
                r#"
                CREATE TABLE files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename TEXT NOT NULL,
                    uri TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )
                "#,
            ),
            (
                "media",
                r#"
                CREATE TABLE media (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )
                "#,
            ),
            (
                "media_fields",
                r#"
                CREATE TABLE media_fields (
                    media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    field_name TEXT NOT NULL,
                    field_type TEXT NOT NULL,
                    file_id INTEGER,
                    PRIMARY KEY (media_id, field_name)
                )
                "#,
            ),
        ];

        for (table, sql) in statements {
            sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create {} table: {}",
                    table, e
                )))
            })?;
        }

        Ok(())
    }

    /// Migration v2: per-session key/value store
    async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE session_store (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (session_id, key)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create session_store table: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record a migration as applied
    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Current schema version
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;

        Ok(version.unwrap_or(0))
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
