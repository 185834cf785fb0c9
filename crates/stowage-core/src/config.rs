//! Configuration module
//!
//! Upload pipeline settings loaded from the environment. Deployment tiers pick the
//! bandwidth ceiling and admission capacity; every value can be overridden individually.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: i64 = 20;
const MAX_VIDEO_SIZE_MB: i64 = 50;
const UPLOAD_TIMEOUT_SECS: u64 = 600;
const DUPLICATE_SIZE_TOLERANCE_BYTES: i64 = 1024;
const UNIQUE_NAME_MAX_ATTEMPTS: u32 = 1000;
const LOCAL_STORAGE_PATH: &str = "uploads";

const MIB: u64 = 1024 * 1024;

/// Deployment tier, selected through `ENVIRONMENT` / `APP_ENV` / `ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTier {
    Production,
    Staging,
    Development,
}

impl DeploymentTier {
    /// Unknown values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => DeploymentTier::Production,
            "staging" | "stage" => DeploymentTier::Staging,
            _ => DeploymentTier::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentTier::Production => "production",
            DeploymentTier::Staging => "staging",
            DeploymentTier::Development => "development",
        }
    }

    /// Bytes per second; 0 disables throttling.
    pub fn default_upload_rate(&self) -> u64 {
        match self {
            DeploymentTier::Production => 5 * MIB,
            DeploymentTier::Staging => 10 * MIB,
            DeploymentTier::Development => 0,
        }
    }

    pub fn default_concurrent_uploads(&self) -> usize {
        match self {
            DeploymentTier::Production => 10,
            DeploymentTier::Staging => 20,
            DeploymentTier::Development => 50,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub tier: DeploymentTier,
    /// Throughput ceiling per upload stream in bytes/second (0 = unlimited)
    pub max_upload_rate_bytes: u64,
    pub max_concurrent_uploads: usize,
    pub max_file_size_bytes: i64,
    pub max_video_size_bytes: i64,
    pub upload_timeout: Duration,
    pub duplicate_size_tolerance_bytes: i64,
    pub unique_name_max_attempts: u32,
    pub local_storage_path: PathBuf,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
}

impl UploadConfig {
    /// Defaults for a tier without reading the environment.
    pub fn for_tier(tier: DeploymentTier) -> Self {
        Self {
            tier,
            max_upload_rate_bytes: tier.default_upload_rate(),
            max_concurrent_uploads: tier.default_concurrent_uploads(),
            max_file_size_bytes: MAX_FILE_SIZE_MB * MIB as i64,
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * MIB as i64,
            upload_timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
            duplicate_size_tolerance_bytes: DUPLICATE_SIZE_TOLERANCE_BYTES,
            unique_name_max_attempts: UNIQUE_NAME_MAX_ATTEMPTS,
            local_storage_path: PathBuf::from(LOCAL_STORAGE_PATH),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let tier = DeploymentTier::parse(&environment);

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<i64>()
            .unwrap_or(MAX_FILE_SIZE_MB);
        let max_video_size_mb = env::var("MAX_VIDEO_SIZE_MB")
            .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
            .parse::<i64>()
            .unwrap_or(MAX_VIDEO_SIZE_MB);

        let config = Self {
            tier,
            max_upload_rate_bytes: env::var("MAX_UPLOAD_RATE_BYTES")
                .unwrap_or_else(|_| tier.default_upload_rate().to_string())
                .parse()
                .unwrap_or(tier.default_upload_rate()),
            max_concurrent_uploads: env::var("MAX_CONCURRENT_UPLOADS")
                .unwrap_or_else(|_| tier.default_concurrent_uploads().to_string())
                .parse()
                .unwrap_or(tier.default_concurrent_uploads()),
            max_file_size_bytes: max_file_size_mb.saturating_mul(MIB as i64),
            max_video_size_bytes: max_video_size_mb.saturating_mul(MIB as i64),
            upload_timeout: Duration::from_secs(
                env::var("UPLOAD_TIMEOUT_SECS")
                    .unwrap_or_else(|_| UPLOAD_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(UPLOAD_TIMEOUT_SECS),
            ),
            duplicate_size_tolerance_bytes: env::var("DUPLICATE_SIZE_TOLERANCE_BYTES")
                .unwrap_or_else(|_| DUPLICATE_SIZE_TOLERANCE_BYTES.to_string())
                .parse()
                .unwrap_or(DUPLICATE_SIZE_TOLERANCE_BYTES),
            unique_name_max_attempts: env::var("UNIQUE_NAME_MAX_ATTEMPTS")
                .unwrap_or_else(|_| UNIQUE_NAME_MAX_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(UNIQUE_NAME_MAX_ATTEMPTS),
            local_storage_path: PathBuf::from(
                env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            ),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_concurrent_uploads < 1 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_UPLOADS must be at least 1"
            ));
        }

        if self.max_file_size_bytes <= 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.max_video_size_bytes <= 0 {
            return Err(anyhow::anyhow!("MAX_VIDEO_SIZE_MB must be greater than 0"));
        }

        if self.upload_timeout.is_zero() {
            return Err(anyhow::anyhow!("UPLOAD_TIMEOUT_SECS must be greater than 0"));
        }

        if self.duplicate_size_tolerance_bytes < 0 {
            return Err(anyhow::anyhow!(
                "DUPLICATE_SIZE_TOLERANCE_BYTES must not be negative"
            ));
        }

        if self.unique_name_max_attempts < 1 {
            return Err(anyhow::anyhow!(
                "UNIQUE_NAME_MAX_ATTEMPTS must be at least 1"
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.tier == DeploymentTier::Production
    }

    /// Size cap applying to a declared upload of the given type.
    pub fn size_cap_for(&self, file_type: crate::models::FileType) -> i64 {
        if file_type == crate::models::FileType::Video {
            self.max_video_size_bytes
        } else {
            self.max_file_size_bytes
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::for_tier(DeploymentTier::Development)
    }
}
