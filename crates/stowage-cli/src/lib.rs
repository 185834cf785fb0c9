//! Wiring for the `stowage` binary: tracing, database, storage and the upload service.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use stowage_core::UploadConfig;
use stowage_db::{InMemoryMetadataStore, PgFileRepository, PgFolderRepository, PgOwnerRepository};
use stowage_storage::{LocalStorage, UniqueNamer};
use stowage_upload::{UploadService, UploadStream};

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Connect to PostgreSQL and apply pending migrations
pub async fn setup_database(config: &UploadConfig) -> Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set (use --dry-run for an in-memory store)")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Build the upload service over PostgreSQL, or over an in-memory store for dry runs.
pub async fn build_service(config: UploadConfig, dry_run: bool) -> Result<UploadService> {
    let storage = LocalStorage::new(
        config.local_storage_path.clone(),
        UniqueNamer::new(config.unique_name_max_attempts),
    )
    .await
    .context("Failed to initialize local storage")?;

    if dry_run {
        tracing::warn!("Dry run: metadata is kept in memory and discarded on exit");
        let store = Arc::new(InMemoryMetadataStore::new());
        return Ok(UploadService::new(
            config,
            storage,
            store.clone(),
            store.clone(),
            store,
        ));
    }

    let pool = setup_database(&config).await?;
    Ok(UploadService::new(
        config,
        storage,
        Arc::new(PgFileRepository::new(pool.clone())),
        Arc::new(PgFolderRepository::new(pool.clone())),
        Arc::new(PgOwnerRepository::new(pool)),
    ))
}

/// A local file opened for upload: its name, size and byte stream.
pub struct LocalUpload {
    pub name: String,
    pub size: i64,
    pub stream: UploadStream,
}

pub async fn open_upload(path: &Path) -> Result<LocalUpload> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file name: {}", path.display()))?;

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let metadata = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }

    Ok(LocalUpload {
        name,
        size: i64::try_from(metadata.len()).context("File too large")?,
        stream: Box::new(file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_upload_reads_name_and_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let upload = open_upload(&path).await.unwrap();
        assert_eq!(upload.name, "notes.txt");
        assert_eq!(upload.size, 11);
    }

    #[tokio::test]
    async fn open_upload_rejects_directories_and_missing_files() {
        let dir = TempDir::new().unwrap();
        assert!(open_upload(dir.path()).await.is_err());
        assert!(open_upload(&dir.path().join("missing.txt")).await.is_err());
    }

    #[tokio::test]
    async fn dry_run_service_uses_config_capacity() {
        let dir = TempDir::new().unwrap();
        let mut config = UploadConfig::default();
        config.local_storage_path = dir.path().to_path_buf();
        config.max_concurrent_uploads = 3;

        let service = build_service(config, true).await.unwrap();
        assert_eq!(service.admission().capacity(), 3);
    }
}
