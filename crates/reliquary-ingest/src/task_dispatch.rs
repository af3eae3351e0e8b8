use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use reliquary_core::models::{Job, JobType};
use reliquary_worker::JobHandlerContext;

use crate::state::AppState;
use crate::task_handlers::derivatives::CreateDerivativesJobHandler;
use crate::task_handlers::ingest::IngestFileJobHandler;
use crate::task_handlers::JobHandler;

#[async_trait]
impl JobHandlerContext for AppState {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value> {
        let handler: Box<dyn JobHandler + Send + Sync> = match job.job_type {
            JobType::IngestFile => Box::new(IngestFileJobHandler),
            JobType::CreateDerivatives => Box::new(CreateDerivativesJobHandler),
        };
        handler.process(job, self).await
    }
}
