//! Content storage: records, their fields, media objects and managed files.

use crate::content::{ContentSource, FileObject, MediaField, MediaObject};
use crate::error::DatabaseError;
use crate::types::{FileId, MediaId, RecordId};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::FromRow;

use super::{Database, NewFile, NewMediaField, Record};

#[derive(FromRow)]
struct FileRow {
    id: i64,
    filename: String,
    uri: String,
}

#[derive(FromRow)]
struct MediaFieldRow {
    field_name: String,
    field_type: String,
    file_id: Option<i64>,
}

fn query_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!(
        "Failed to {}: {}",
        what, e
    )))
}

impl Database {
    /// Insert a new content record
    pub async fn insert_record(&self, title: &str) -> Result<RecordId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("INSERT INTO records (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("insert record", e))?;

        Ok(RecordId(result.last_insert_rowid()))
    }

    /// Get a content record by ID
    pub async fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        sqlx::query_as::<_, Record>("SELECT id, title, created_at FROM records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("get record", e))
    }

    /// Delete a content record along with its fields
    pub async fn delete_record(&self, id: RecordId) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete record", e))?;

        Ok(())
    }

    /// Attach a field to a record, replacing any previous values
    ///
    /// `targets` are file ids for file fields and media ids for media
    /// fields, in declaration order. An empty slice leaves the field present
    /// but empty.
    pub async fn set_record_field(
        &self,
        record_id: RecordId,
        field_name: &str,
        targets: &[i64],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO record_fields (record_id, field_name)
            VALUES (?, ?)
            ON CONFLICT(record_id, field_name) DO NOTHING
            "#,
        )
        .bind(record_id)
        .bind(field_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "record {} does not exist",
                    record_id
                )))
            }
            _ => query_failed("insert record field", e),
        })?;

        sqlx::query("DELETE FROM record_field_items WHERE record_id = ? AND field_name = ?")
            .bind(record_id)
            .bind(field_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("clear record field", e))?;

        for (delta, target_id) in targets.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO record_field_items (record_id, field_name, delta, target_id)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(record_id)
            .bind(field_name)
            .bind(delta as i64)
            .bind(target_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("insert record field item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit record field", e))?;

        Ok(())
    }

    /// Remove a field from a record entirely
    pub async fn remove_record_field(&self, record_id: RecordId, field_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM record_fields WHERE record_id = ? AND field_name = ?")
            .bind(record_id)
            .bind(field_name)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("remove record field", e))?;

        Ok(())
    }

    /// Register a managed file
    pub async fn insert_file(&self, file: &NewFile) -> Result<FileId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("INSERT INTO files (filename, uri, created_at) VALUES (?, ?, ?)")
            .bind(&file.filename)
            .bind(&file.uri)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("insert file", e))?;

        Ok(result.last_insert_rowid())
    }

    /// Forget a managed file (references to it become dangling)
    pub async fn delete_file(&self, file_id: FileId) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete file", e))?;

        Ok(())
    }

    /// Create a media object with its fields in the given order
    pub async fn insert_media(&self, name: &str, fields: &[NewMediaField]) -> Result<MediaId> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        let media_id = sqlx::query("INSERT INTO media (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("insert media", e))?
            .last_insert_rowid();

        for (position, field) in fields.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO media_fields (media_id, position, field_name, field_type, file_id)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(media_id)
            .bind(position as i64)
            .bind(&field.name)
            .bind(&field.field_type)
            .bind(field.file_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("insert media field", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit media", e))?;

        Ok(media_id)
    }
}

#[async_trait]
impl ContentSource for Database {
    async fn record_exists(&self, record_id: RecordId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM records WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("check record", e))?;

        Ok(found.is_some())
    }

    async fn field_references(
        &self,
        record_id: RecordId,
        field_name: &str,
    ) -> Result<Option<Vec<i64>>> {
        let present: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM record_fields WHERE record_id = ? AND field_name = ?",
        )
        .bind(record_id)
        .bind(field_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("check record field", e))?;

        if present.is_none() {
            return Ok(None);
        }

        let targets: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT target_id FROM record_field_items
            WHERE record_id = ? AND field_name = ?
            ORDER BY delta ASC
            "#,
        )
        .bind(record_id)
        .bind(field_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list record field items", e))?;

        Ok(Some(targets))
    }

    async fn load_media(&self, media_id: MediaId) -> Result<Option<MediaObject>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM media WHERE id = ?")
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("load media", e))?;

        let Some(name) = name else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, MediaFieldRow>(
            r#"
            SELECT field_name, field_type, file_id FROM media_fields
            WHERE media_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("load media fields", e))?;

        Ok(Some(MediaObject {
            id: media_id,
            name,
            fields: rows
                .into_iter()
                .map(|row| MediaField {
                    name: row.field_name,
                    field_type: row.field_type,
                    file_id: row.file_id,
                })
                .collect(),
        }))
    }

    async fn load_file(&self, file_id: FileId) -> Result<Option<FileObject>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT id, filename, uri FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("load file", e))?;

        Ok(row.map(|row| FileObject {
            id: row.id,
            filename: row.filename,
            uri: row.uri,
        }))
    }
}
