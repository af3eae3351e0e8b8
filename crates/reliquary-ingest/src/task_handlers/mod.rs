pub mod derivatives;
pub mod ingest;

use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reliquary_core::models::Job;
use reliquary_core::{AppError, ErrorMetadata, TaskError};
use reliquary_storage::Storage;
use std::sync::Arc;

/// Runs one queued job against the shared state.
///
/// Errors are returned as [`TaskError`] inside `anyhow` so the queue can tell
/// retryable failures from permanent ones.
#[async_trait]
pub trait JobHandler {
    async fn process(&self, job: &Job, state: Arc<AppState>) -> Result<serde_json::Value>;
}

/// Payloads that do not parse will not parse on retry either.
pub(crate) fn invalid_payload(job: &Job, err: serde_json::Error) -> anyhow::Error {
    tracing::error!(
        job_id = %job.id,
        job_type = %job.job_type,
        error = %err,
        "Invalid job payload"
    );
    TaskError::unrecoverable(
        anyhow::Error::new(err).context(format!("Failed to parse {} payload", job.job_type)),
    )
    .into()
}

pub(crate) fn job_failure(err: AppError) -> anyhow::Error {
    tracing::warn!(
        error_code = err.error_code(),
        recoverable = err.is_recoverable(),
        error = %err,
        "Job failed"
    );
    TaskError::from(err).into()
}

const BLOB_CLEANUP_CONCURRENCY: usize = 8;

/// Delete blobs no record points at any more. Failures are logged and skipped.
pub(crate) async fn delete_blobs(storage: &dyn Storage, keys: Vec<String>, reason: &str) {
    stream::iter(keys)
        .map(|key| async move {
            if let Err(e) = storage.delete(&key).await {
                tracing::warn!(storage_key = %key, error = %e, reason, "Failed to delete blob");
            }
        })
        .buffer_unordered(BLOB_CLEANUP_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;
}
