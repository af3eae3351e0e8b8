use anyhow::{Context, Result};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

use reliquary_core::models::JobStatus;
use reliquary_core::Config;
use reliquary_db::{
    InMemoryResourceRepository, InMemorySearchIndex, JobRepository, ResourceRepository, SearchIndex,
};
use reliquary_infra::{LoggingListener, Publisher, RateLimiter};
use reliquary_processing::{CharacterizerRegistry, DerivativeRegistry};
use reliquary_storage::{create_storage, Storage};
use reliquary_transactions::default_container;
use reliquary_worker::{JobHandlerContext, JobQueue, JobQueueConfig};

use crate::state::AppState;

const JOB_FINISHED_CHANNEL_CAPACITY: usize = 256;

/// Backends the state is assembled from.
pub struct ServiceParts {
    pub repository: Arc<dyn ResourceRepository>,
    pub storage: Arc<dyn Storage>,
    pub search_index: Arc<dyn SearchIndex>,
    pub publisher: Publisher,
    pub jobs: JobRepository,
}

impl ServiceParts {
    /// In-process gateway, search index and job store around `storage`.
    pub fn in_memory(storage: Arc<dyn Storage>) -> Self {
        Self {
            repository: Arc::new(InMemoryResourceRepository::new()),
            storage,
            search_index: Arc::new(InMemorySearchIndex::new()),
            publisher: Publisher::new(),
            jobs: JobRepository::new(),
        }
    }
}

/// A running state plus the channel reporting finished jobs.
pub struct Services {
    pub state: Arc<AppState>,
    pub job_finished_rx: mpsc::Receiver<(Uuid, JobStatus)>,
}

/// Build services from configuration: storage from the configured backend,
/// in-process persistence, and a worker pool running against the state.
pub async fn initialize_services(config: &Config) -> Result<Services> {
    config
        .validate()
        .context("Configuration validation failed")?;

    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %storage.backend_type(), "Storage initialized");

    let parts = ServiceParts::in_memory(storage);
    parts.publisher.subscribe(Arc::new(LoggingListener));

    Ok(start_services(config, parts))
}

/// Assemble the state and start the job queue's worker pool against it.
///
/// Must be called inside a Tokio runtime.
pub fn start_services(config: &Config, parts: ServiceParts) -> Services {
    let (job_finished_tx, job_finished_rx) = mpsc::channel(JOB_FINISHED_CHANNEL_CAPACITY);
    let rate_limiter = rate_limiter(config);
    let queue_config = JobQueueConfig::from(config);

    // The queue's workers hold the state weakly; the state owns the queue.
    let state = Arc::new_cyclic(|weak: &Weak<AppState>| {
        let context: Weak<dyn JobHandlerContext> = weak.clone();
        let job_queue = JobQueue::new(
            parts.jobs.clone(),
            rate_limiter,
            queue_config,
            context,
            Some(job_finished_tx),
        );
        assemble(config, &parts, job_queue)
    });

    tracing::info!(
        max_workers = config.job_queue_max_workers,
        derivative_rate_limit = config.job_queue_derivative_rate_limit,
        "Job queue started"
    );

    Services {
        state,
        job_finished_rx,
    }
}

/// State whose queue only records jobs; nothing runs them. Jobs can be run
/// by hand through [`JobHandlerContext::dispatch_job`].
pub fn build_state_without_worker(config: &Config, parts: ServiceParts) -> Arc<AppState> {
    let job_queue = JobQueue::new_no_worker(
        parts.jobs.clone(),
        rate_limiter(config),
        JobQueueConfig::from(config),
    );
    Arc::new(assemble(config, &parts, job_queue))
}

fn rate_limiter(config: &Config) -> RateLimiter {
    RateLimiter::new(config.job_queue_derivative_rate_limit)
}

fn assemble(config: &Config, parts: &ServiceParts, job_queue: JobQueue) -> AppState {
    let transactions = default_container(
        parts.repository.clone(),
        parts.storage.clone(),
        parts.publisher.clone(),
    );

    AppState {
        config: config.clone(),
        repository: parts.repository.clone(),
        storage: parts.storage.clone(),
        search_index: parts.search_index.clone(),
        publisher: parts.publisher.clone(),
        characterizers: Arc::new(CharacterizerRegistry::with_defaults()),
        derivatives: Arc::new(DerivativeRegistry::from_config(config)),
        job_queue,
        transactions: Arc::new(transactions),
    }
}
