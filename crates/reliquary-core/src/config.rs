//! Configuration module
//!
//! Environment-driven settings for storage, the job queue and derivative
//! generation. Values fall back to defaults when unset or unparseable.

use std::env;

use crate::constants::{DEFAULT_THUMBNAIL_MAX_HEIGHT, DEFAULT_THUMBNAIL_MAX_WIDTH};
use crate::storage_types::StorageBackend;

const MAX_UPLOAD_SIZE_MB: usize = 500;
const JOB_QUEUE_MAX_WORKERS: usize = 4;
const JOB_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const JOB_QUEUE_DEFAULT_TIMEOUT_SECS: i32 = 600;
const JOB_QUEUE_MAX_RETRIES: i32 = 3;
const JOB_QUEUE_RETRY_BACKOFF_MS: u64 = 1000;
const JOB_QUEUE_DERIVATIVE_RATE_LIMIT: f64 = 10.0;
const JOB_QUEUE_FINISHED_RETENTION_SECS: u64 = 86_400;

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub max_upload_size_bytes: usize,
    pub job_queue_max_workers: usize,
    pub job_queue_poll_interval_ms: u64,
    pub job_queue_default_timeout_seconds: i32,
    pub job_queue_max_retries: i32,
    /// Delay before the first retry; doubles with every further retry.
    pub job_queue_retry_backoff_ms: u64,
    /// Derivative jobs per second; 0 disables the limiter.
    pub job_queue_derivative_rate_limit: f64,
    /// How long completed and failed jobs stay queryable before they are pruned.
    pub job_queue_finished_retention_secs: u64,
    pub thumbnail_max_width: u32,
    pub thumbnail_max_height: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value
                .parse::<StorageBackend>()
                .map_err(|e| anyhow::anyhow!("STORAGE_BACKEND: {}", e))?,
            Err(_) => StorageBackend::Local,
        };

        let config = Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
                .parse()
                .unwrap_or(MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
            job_queue_max_workers: env::var("JOB_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| JOB_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_MAX_WORKERS),
            job_queue_poll_interval_ms: env::var("JOB_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| JOB_QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_POLL_INTERVAL_MS),
            job_queue_default_timeout_seconds: env::var("JOB_QUEUE_DEFAULT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| JOB_QUEUE_DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_DEFAULT_TIMEOUT_SECS),
            job_queue_max_retries: env::var("JOB_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| JOB_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_MAX_RETRIES),
            job_queue_retry_backoff_ms: env::var("JOB_QUEUE_RETRY_BACKOFF_MS")
                .unwrap_or_else(|_| JOB_QUEUE_RETRY_BACKOFF_MS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_RETRY_BACKOFF_MS),
            job_queue_derivative_rate_limit: env::var("JOB_QUEUE_DERIVATIVE_RATE_LIMIT")
                .unwrap_or_else(|_| JOB_QUEUE_DERIVATIVE_RATE_LIMIT.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_DERIVATIVE_RATE_LIMIT),
            job_queue_finished_retention_secs: env::var("JOB_QUEUE_FINISHED_RETENTION_SECS")
                .unwrap_or_else(|_| JOB_QUEUE_FINISHED_RETENTION_SECS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_FINISHED_RETENTION_SECS),
            thumbnail_max_width: env::var("THUMBNAIL_MAX_WIDTH")
                .unwrap_or_else(|_| DEFAULT_THUMBNAIL_MAX_WIDTH.to_string())
                .parse()
                .unwrap_or(DEFAULT_THUMBNAIL_MAX_WIDTH),
            thumbnail_max_height: env::var("THUMBNAIL_MAX_HEIGHT")
                .unwrap_or_else(|_| DEFAULT_THUMBNAIL_MAX_HEIGHT.to_string())
                .parse()
                .unwrap_or(DEFAULT_THUMBNAIL_MAX_HEIGHT),
        };

        Ok(config)
    }

    /// In-memory storage, one worker and a fast poll loop.
    pub fn for_tests() -> Self {
        Config {
            environment: "test".to_string(),
            storage_backend: StorageBackend::Memory,
            local_storage_path: None,
            local_storage_base_url: None,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            job_queue_max_workers: 1,
            job_queue_poll_interval_ms: 20,
            job_queue_default_timeout_seconds: 30,
            job_queue_max_retries: JOB_QUEUE_MAX_RETRIES,
            job_queue_retry_backoff_ms: 10,
            job_queue_derivative_rate_limit: 0.0,
            job_queue_finished_retention_secs: JOB_QUEUE_FINISHED_RETENTION_SECS,
            thumbnail_max_width: DEFAULT_THUMBNAIL_MAX_WIDTH,
            thumbnail_max_height: DEFAULT_THUMBNAIL_MAX_HEIGHT,
        }
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.job_queue_max_workers == 0 {
            return Err(anyhow::anyhow!("JOB_QUEUE_MAX_WORKERS must be at least 1"));
        }

        if self.job_queue_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "JOB_QUEUE_POLL_INTERVAL_MS must be greater than zero"
            ));
        }

        if self.job_queue_max_retries < 0 {
            return Err(anyhow::anyhow!("JOB_QUEUE_MAX_RETRIES must not be negative"));
        }

        if self.storage_backend == StorageBackend::Local
            && self
                .local_storage_path
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH to be set"
            ));
        }

        if self.thumbnail_max_width == 0 || self.thumbnail_max_height == 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_MAX_WIDTH and THUMBNAIL_MAX_HEIGHT must be greater than zero"
            ));
        }

        if self.is_production() && self.storage_backend == StorageBackend::Memory {
            tracing::warn!("STORAGE_BACKEND=memory in production; payloads are not durable");
        }

        Ok(())
    }
}
