use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use stowage_core::AppError;
use uuid::Uuid;

use crate::traits::QuotaLookup;

/// Repository for owner storage limits
#[derive(Clone)]
pub struct PgOwnerRepository {
    pool: PgPool,
}

impl PgOwnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLookup for PgOwnerRepository {
    #[tracing::instrument(skip(self), fields(db.table = "owners", db.operation = "select", db.record_id = %owner_id))]
    async fn storage_limit(&self, owner_id: Uuid) -> Result<i64, AppError> {
        let limit = sqlx::query_scalar::<Postgres, i64>(
            "SELECT storage_limit FROM owners WHERE id = $1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        limit.ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))
    }
}
