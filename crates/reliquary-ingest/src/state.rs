use anyhow::{Context, Result};
use std::sync::Arc;

use reliquary_core::models::{Resource, ResourceId, User};
use reliquary_core::Config;
use reliquary_db::{queries, ResourceRepository, SearchIndex};
use reliquary_infra::Publisher;
use reliquary_processing::{CharacterizerRegistry, DerivativeRegistry};
use reliquary_storage::Storage;
use reliquary_transactions::{Container, FileSetDestroy, StepOptions, Transaction, WorkDestroy};
use reliquary_worker::JobQueue;

/// Everything a job needs while it runs.
pub struct AppState {
    pub config: Config,
    pub repository: Arc<dyn ResourceRepository>,
    pub storage: Arc<dyn Storage>,
    pub search_index: Arc<dyn SearchIndex>,
    pub publisher: Publisher,
    pub characterizers: Arc<CharacterizerRegistry>,
    pub derivatives: Arc<DerivativeRegistry>,
    pub job_queue: JobQueue,
    /// Destroy steps, resolved by name when a transaction is built.
    pub transactions: Arc<Container<Resource>>,
}

impl AppState {
    /// Delete a Work and its access controls.
    #[tracing::instrument(skip(self, user), fields(work_id = %id))]
    pub async fn destroy_work(&self, id: &ResourceId, user: Option<User>) -> Result<Resource> {
        let transaction = WorkDestroy::build(&self.transactions)?;
        let work = queries::find_work(self.repository.as_ref(), id)
            .await
            .with_context(|| format!("Failed to load {} for destroy", id))?;
        self.run_destroy(transaction, work.into(), user).await
    }

    /// Delete a FileSet, its files and blobs, and its access controls.
    #[tracing::instrument(skip(self, user), fields(file_set_id = %id))]
    pub async fn destroy_file_set(&self, id: &ResourceId, user: Option<User>) -> Result<Resource> {
        let transaction = FileSetDestroy::build(&self.transactions)?;
        let file_set = queries::find_file_set(self.repository.as_ref(), id)
            .await
            .with_context(|| format!("Failed to load {} for destroy", id))?;
        let destroyed = self.run_destroy(transaction, file_set.into(), user).await?;
        if let Err(e) = self.search_index.delete(id).await {
            tracing::warn!(error = %e, "Failed to remove FileSet from the search index");
        }
        Ok(destroyed)
    }

    async fn run_destroy(
        &self,
        transaction: Transaction<Resource>,
        resource: Resource,
        user: Option<User>,
    ) -> Result<Resource> {
        let options = match user {
            Some(user) => StepOptions::new().with_user(user),
            None => StepOptions::new(),
        };
        let destroyed = transaction.call(resource, &options).await?;
        tracing::info!(
            kind = %destroyed.kind(),
            steps = ?transaction.step_names(),
            "Resource destroyed"
        );
        Ok(destroyed)
    }
}
