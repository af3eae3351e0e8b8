//! Job store
//!
//! Holds queued jobs for the worker pool. Claiming a job moves it to
//! `running` under the store lock, so two workers never claim the same job.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reliquary_core::models::{Job, JobStatus, JobType, Priority};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Clone, Default)]
pub struct JobRepository {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl JobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn create_job(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: i32,
        timeout_seconds: Option<i32>,
    ) -> Result<Job> {
        let job = Job::new(
            job_type,
            payload,
            priority,
            scheduled_at,
            max_retries,
            timeout_seconds,
        );
        self.jobs.lock().await.insert(job.id, job.clone());

        tracing::debug!(job_id = %job.id, job_type = %job.job_type, "Job created");
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().await.get(&job_id).cloned())
    }

    /// All jobs, optionally filtered by status, oldest first.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut found: Vec<Job> = jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    /// Claim the highest-priority job that is due, marking it running.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_job(&self) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().await;

        let next_id = jobs
            .values()
            .filter(|j| j.is_ready_to_run())
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.scheduled_at.cmp(&a.scheduled_at))
            })
            .map(|j| j.id);

        let Some(job_id) = next_id else {
            return Ok(None);
        };

        let job = jobs
            .get_mut(&job_id)
            .context("Claimed job disappeared from the store")?;
        let now = Utc::now();
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.updated_at = now;

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            "Job claimed"
        );

        Ok(Some(job.clone()))
    }

    async fn update<F>(&self, job_id: Uuid, apply: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(&job_id)
            .with_context(|| format!("Job {} not found", job_id))?;
        apply(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, job_id: Uuid, result: serde_json::Value) -> Result<Job> {
        let job = self
            .update(job_id, |job| {
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.completed_at = Some(Utc::now());
            })
            .await
            .context("Failed to mark job as completed")?;

        tracing::info!(
            job_id = %job_id,
            job_type = %job.job_type,
            "Job completed"
        );
        Ok(job)
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, job_id: Uuid, error: serde_json::Value) -> Result<Job> {
        let job = self
            .update(job_id, |job| {
                job.status = JobStatus::Failed;
                job.result = Some(error);
                job.completed_at = Some(Utc::now());
            })
            .await
            .context("Failed to mark job as failed")?;

        tracing::error!(
            job_id = %job_id,
            job_type = %job.job_type,
            retry_count = job.retry_count,
            "Job failed"
        );
        Ok(job)
    }

    /// Increment the retry count and reschedule the job after `backoff`.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_retry(&self, job_id: Uuid, backoff: std::time::Duration) -> Result<Job> {
        let delay = Duration::from_std(backoff).unwrap_or_else(|_| Duration::seconds(0));
        let job = self
            .update(job_id, |job| {
                job.retry_count += 1;
                job.started_at = None;
                job.status = JobStatus::Scheduled;
                job.scheduled_at = Utc::now() + delay;
            })
            .await
            .context("Failed to schedule job retry")?;

        tracing::info!(
            job_id = %job_id,
            retry_count = job.retry_count,
            max_retries = job.max_retries,
            scheduled_at = %job.scheduled_at,
            "Job retry scheduled"
        );
        Ok(job)
    }

    /// Drop terminal jobs that finished more than `older_than` ago.
    pub async fn prune_finished(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.unwrap_or(job.updated_at) <= cutoff)
        });
        let pruned = before - jobs.len();

        if pruned > 0 {
            tracing::debug!(pruned, remaining = jobs.len(), "Pruned finished jobs");
        }
        pruned
    }

    pub async fn get_stats(&self) -> Result<JobStats> {
        let jobs = self.jobs.lock().await;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Scheduled => stats.scheduled += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }
}
