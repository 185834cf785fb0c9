use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use stowage_core::{AppError, FileRecord, NewFileRecord};
use uuid::Uuid;

use crate::traits::FileRecordStore;

const FILE_COLUMNS: &str =
    "id, owner_id, name, size, file_type, path, folder_id, thumbnail_data, created_at, updated_at";

/// Repository for file records
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for PgFileRepository {
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_owner_and_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {} FROM files WHERE owner_id = $1 AND name = $2",
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "aggregate"))]
    async fn total_size_by_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COALESCE(SUM(size), 0)::BIGINT FROM files WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    #[tracing::instrument(
        skip(self, record),
        fields(db.table = "files", db.operation = "insert", owner_id = %record.owner_id, file_name = %record.name)
    )]
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let created = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            INSERT INTO files (owner_id, name, size, file_type, path, folder_id, thumbnail_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(record.owner_id)
        .bind(&record.name)
        .bind(record.size)
        .bind(record.file_type)
        .bind(&record.path)
        .bind(record.folder_id)
        .bind(&record.thumbnail_data)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {} FROM files WHERE owner_id = $1 AND id = $2",
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn move_to_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            UPDATE files
            SET folder_id = $3, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .bind(id)
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let records = match folder_id {
            None => {
                sqlx::query_as::<Postgres, FileRecord>(&format!(
                    "SELECT {} FROM files WHERE owner_id = $1 ORDER BY created_at DESC",
                    FILE_COLUMNS
                ))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
            Some(fid) => {
                sqlx::query_as::<Postgres, FileRecord>(&format!(
                    "SELECT {} FROM files WHERE owner_id = $1 AND folder_id = $2 ORDER BY created_at DESC",
                    FILE_COLUMNS
                ))
                .bind(owner_id)
                .bind(fid)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(records)
    }
}
