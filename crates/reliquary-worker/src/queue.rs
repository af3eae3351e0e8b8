//! Job queue: worker pool, polling with wakeup on submit, retry, and submission.
//!
//! Shutdown: [`JobQueue::shutdown`] signals the pool to stop; it does not wait for
//! in-flight jobs. Jobs already handed to a worker run until they finish or time out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use reliquary_core::models::{Job, JobStatus, JobType, Priority};
use reliquary_core::{Config, JobEnqueuer, TaskError};
use reliquary_db::JobRepository;
use reliquary_infra::RateLimiter;

use crate::context::JobHandlerContext;

/// Maximum delay in seconds before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// How often the pool sweeps old finished jobs out of the store.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Backoff for a given retry count: `base * 2^retry_count`, capped.
#[inline]
pub(crate) fn compute_retry_backoff(retry_count: i32, base: Duration) -> Duration {
    let factor = 2_u32.saturating_pow(retry_count.max(0) as u32);
    base.saturating_mul(factor)
        .min(Duration::from_secs(MAX_RETRY_BACKOFF_SECS))
}

/// Receives `(job_id, status)` whenever a job reaches a terminal status.
pub type JobFinishedSender = mpsc::Sender<(Uuid, JobStatus)>;

#[derive(Clone)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
    /// Backoff before the first retry; doubles with every further retry.
    pub retry_backoff_base_ms: u64,
    /// Finished jobs older than this are pruned from the store.
    pub finished_retention_secs: u64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            default_timeout_seconds: 3600,
            max_retries: 3,
            retry_backoff_base_ms: 1000,
            finished_retention_secs: 86_400,
        }
    }
}

impl From<&Config> for JobQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.job_queue_max_workers,
            poll_interval_ms: config.job_queue_poll_interval_ms,
            default_timeout_seconds: config.job_queue_default_timeout_seconds,
            max_retries: config.job_queue_max_retries,
            retry_backoff_base_ms: config.job_queue_retry_backoff_ms,
            finished_retention_secs: config.job_queue_finished_retention_secs,
        }
    }
}

pub struct JobQueue {
    repository: JobRepository,
    rate_limiter: RateLimiter,
    config: JobQueueConfig,
    wakeup: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create a new JobQueue and spawn its worker pool.
    ///
    /// The pool polls the store every `poll_interval_ms` and is also woken
    /// whenever a job is submitted or a worker frees up.
    pub fn new(
        repository: JobRepository,
        rate_limiter: RateLimiter,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let wakeup = Arc::new(Notify::new());

        let repo_clone = repository.clone();
        let limiter_clone = rate_limiter.clone();
        let config_clone = config.clone();
        let wakeup_clone = wakeup.clone();

        tokio::spawn(async move {
            Self::worker_pool(
                repo_clone,
                limiter_clone,
                config_clone,
                context,
                wakeup_clone,
                shutdown_rx,
                job_finished_tx,
            )
            .await;
        });

        Self {
            repository,
            rate_limiter,
            config,
            wakeup,
            shutdown_tx,
        }
    }

    /// Creates a JobQueue that does not spawn a worker.
    /// Use for temporary state that is dropped before the real queue; jobs submitted here
    /// are written to the store and will be picked up by the real worker.
    pub fn new_no_worker(
        repository: JobRepository,
        rate_limiter: RateLimiter,
        config: JobQueueConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            repository,
            rate_limiter,
            config,
            wakeup: Arc::new(Notify::new()),
            shutdown_tx,
        }
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repository
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Submit a new job to the queue.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit_job(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let job = self
            .repository
            .create_job(
                job_type,
                payload,
                priority,
                scheduled_at,
                self.config.max_retries,
                Some(self.config.default_timeout_seconds),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    job_type = %job_type,
                    priority = priority.as_i32(),
                    "Failed to create job in repository"
                );
                anyhow::anyhow!("Failed to create job in repository: {}", e)
            })?;

        self.wakeup.notify_one();

        tracing::info!(
            job_id = %job.id,
            job_type = %job_type,
            priority = priority.as_i32(),
            "Job submitted to queue"
        );

        Ok(job.id)
    }

    async fn worker_pool(
        repository: JobRepository,
        rate_limiter: RateLimiter,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        wakeup: Arc<Notify>,
        mut shutdown_rx: mpsc::Receiver<()>,
        job_finished_tx: Option<JobFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let backoff_base = Duration::from_millis(config.retry_backoff_base_ms);
        let retention = chrono::Duration::seconds(
            i64::try_from(config.finished_retention_secs).unwrap_or(i64::MAX / 1000),
        );
        let mut last_prune = tokio::time::Instant::now();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                _ = wakeup.notified() => {}
                _ = sleep(poll_interval) => {}
            }

            if last_prune.elapsed() >= PRUNE_INTERVAL {
                repository.prune_finished(retention).await;
                last_prune = tokio::time::Instant::now();
            }

            while Self::claim_and_dispatch_one(
                &repository,
                &rate_limiter,
                &semaphore,
                &context,
                &wakeup,
                backoff_base,
                job_finished_tx.clone(),
            )
            .await
            {}
        }

        tracing::info!("Job queue worker pool stopped");
    }

    /// Returns `true` when a job was handed to a worker.
    async fn claim_and_dispatch_one(
        repository: &JobRepository,
        rate_limiter: &RateLimiter,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn JobHandlerContext>,
        wakeup: &Arc<Notify>,
        backoff_base: Duration,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return false;
            }
        };

        match repository.claim_next_job().await {
            Ok(Some(job)) => {
                let repo = repository.clone();
                let limiter = rate_limiter.clone();
                let ctx = context.clone();
                let wakeup = wakeup.clone();

                tokio::spawn(async move {
                    if let Err(e) = Self::process_job_with_retry(
                        job,
                        repo,
                        limiter,
                        ctx,
                        backoff_base,
                        job_finished_tx,
                    )
                    .await
                    {
                        tracing::error!(error = %e, "Job processing failed");
                    }
                    drop(permit);
                    wakeup.notify_one();
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No jobs available in queue");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim job from queue");
                false
            }
        }
    }

    #[tracing::instrument(
        skip(repository, rate_limiter, context, job_finished_tx),
        fields(job.id = %job.id, job.type = %job.job_type)
    )]
    async fn process_job_with_retry(
        job: Job,
        repository: JobRepository,
        rate_limiter: RateLimiter,
        context: Weak<dyn JobHandlerContext>,
        backoff_base: Duration,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> Result<()> {
        rate_limiter.acquire(&job.job_type).await;

        let Some(ctx) = context.upgrade() else {
            let error_result = json!({
                "error": "Job handler context was dropped",
                "retry_count": job.retry_count,
                "unrecoverable": true,
            });
            Self::fail_job(&repository, &job_finished_tx, job.id, error_result).await?;
            anyhow::bail!("JobHandlerContext was dropped, cannot process job");
        };

        let timeout_duration = job
            .timeout_seconds
            .map(|s| Duration::from_secs(s.max(1) as u64))
            .unwrap_or(Duration::from_secs(3600));

        let result = tokio::time::timeout(timeout_duration, ctx.dispatch_job(&job)).await;

        match result {
            Ok(Ok(job_result)) => {
                if let Err(e) = repository.mark_completed(job.id, job_result).await {
                    tracing::error!(
                        job_id = %job.id,
                        error = %format!("{:#}", e),
                        "Failed to record job completion"
                    );
                    let error_result = json!({
                        "error": format!("{:#}", e),
                        "reason": "Job result could not be recorded"
                    });
                    Self::fail_job(&repository, &job_finished_tx, job.id, error_result).await?;
                    return Err(e);
                }
                Self::notify_finished(&job_finished_tx, job.id, JobStatus::Completed).await;
                tracing::info!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    "Job completed successfully"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                // Check if this is a TaskError with unrecoverable flag
                let is_unrecoverable = e
                    .downcast_ref::<TaskError>()
                    .map(|te| !te.is_recoverable())
                    .unwrap_or(false);

                tracing::error!(
                    job_id = %job.id,
                    error = %format!("{:#}", e),
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    unrecoverable = is_unrecoverable,
                    "Job execution failed"
                );

                // Don't retry if the error is explicitly marked as unrecoverable
                if is_unrecoverable {
                    let error_result = json!({
                        "error": format!("{:#}", e),
                        "retry_count": job.retry_count,
                        "unrecoverable": true,
                        "reason": "Job failed with unrecoverable error"
                    });
                    Self::fail_job(&repository, &job_finished_tx, job.id, error_result).await?;
                    tracing::error!(
                        job_id = %job.id,
                        "Job failed with unrecoverable error, will not retry"
                    );
                    return Err(e);
                }

                if job.can_retry() {
                    let backoff = compute_retry_backoff(job.retry_count, backoff_base);
                    tracing::info!(
                        job_id = %job.id,
                        retry_count = job.retry_count + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Scheduling job retry"
                    );
                    repository.schedule_retry(job.id, backoff).await?;
                    Ok(())
                } else {
                    let error_result = json!({
                        "error": format!("{:#}", e),
                        "retry_count": job.retry_count,
                        "reason": "Job failed after maximum retries"
                    });
                    Self::fail_job(&repository, &job_finished_tx, job.id, error_result).await?;
                    tracing::error!(job_id = %job.id, "Job failed after max retries");
                    Err(e)
                }
            }
            Err(_) => {
                tracing::error!(
                    job_id = %job.id,
                    timeout_seconds = ?job.timeout_seconds,
                    "Job execution timed out"
                );
                if job.can_retry() {
                    let backoff = compute_retry_backoff(job.retry_count, backoff_base);
                    repository.schedule_retry(job.id, backoff).await?;
                    Ok(())
                } else {
                    let error_result = json!({
                        "error": "Job execution timed out",
                        "timeout_seconds": job.timeout_seconds,
                    });
                    Self::fail_job(&repository, &job_finished_tx, job.id, error_result).await?;
                    Err(anyhow::anyhow!("Job execution timed out"))
                }
            }
        }
    }

    /// Mark the job failed and report it as finished even if the store refuses the update.
    async fn fail_job(
        repository: &JobRepository,
        job_finished_tx: &Option<JobFinishedSender>,
        job_id: Uuid,
        error_result: serde_json::Value,
    ) -> Result<()> {
        let marked = repository
            .mark_failed(job_id, error_result)
            .await
            .context("Failed to mark job as failed");
        Self::notify_finished(job_finished_tx, job_id, JobStatus::Failed).await;
        marked.map(|_| ())
    }

    async fn notify_finished(tx: &Option<JobFinishedSender>, job_id: Uuid, status: JobStatus) {
        if let Some(tx) = tx {
            let _ = tx.send((job_id, status)).await;
        }
    }

    /// Signals the worker pool to stop claiming new jobs and exit the main loop.
    ///
    /// Returns immediately after sending the signal. Already-spawned job handlers
    /// keep running until they complete or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Clone for JobQueue {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            rate_limiter: self.rate_limiter.clone(),
            config: self.config.clone(),
            wakeup: self.wakeup.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}

#[async_trait]
impl JobEnqueuer for JobQueue {
    async fn enqueue(&self, job_type: JobType, payload: serde_json::Value) -> Result<Uuid> {
        self.submit_job(job_type, payload, Priority::Normal, None)
            .await
    }
}
