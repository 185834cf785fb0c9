use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use stowage_core::AppError;
use uuid::Uuid;

use crate::traits::FolderLookup;

/// Repository for folder lookups
#[derive(Clone)]
pub struct PgFolderRepository {
    pool: PgPool,
}

impl PgFolderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderLookup for PgFolderRepository {
    #[tracing::instrument(skip(self), fields(db.table = "folders", db.operation = "select", db.record_id = %folder_id))]
    async fn folder_exists(&self, owner_id: Uuid, folder_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1 AND owner_id = $2)",
        )
        .bind(folder_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
