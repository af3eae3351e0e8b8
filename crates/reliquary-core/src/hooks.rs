//! Hooks and traits for cross-crate collaboration
//!
//! Jobs need to schedule follow-up work without depending on the worker crate
//! that owns the queue. The queue implements these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::JobType;

/// Accepts a named job with a JSON payload for asynchronous execution.
///
/// Delivery is at-least-once; no ordering is guaranteed between jobs.
#[async_trait]
pub trait JobEnqueuer: Send + Sync {
    async fn enqueue(&self, job_type: JobType, payload: serde_json::Value)
        -> anyhow::Result<Uuid>;
}

/// Enqueuer that accepts and drops every job.
pub struct NoOpJobEnqueuer;

#[async_trait]
impl JobEnqueuer for NoOpJobEnqueuer {
    async fn enqueue(
        &self,
        _job_type: JobType,
        _payload: serde_json::Value,
    ) -> anyhow::Result<Uuid> {
        Ok(Uuid::nil())
    }
}
