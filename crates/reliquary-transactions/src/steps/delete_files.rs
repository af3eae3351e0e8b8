use anyhow::Context;
use async_trait::async_trait;
use reliquary_core::models::Resource;
use reliquary_core::AppError;
use reliquary_db::{queries, ResourceRepository};
use reliquary_storage::Storage;
use std::sync::Arc;

use crate::step::{Step, StepOptions};

/// Deletes a FileSet's FileMetadata records and their stored bytes.
pub struct DeleteFiles {
    repository: Arc<dyn ResourceRepository>,
    storage: Arc<dyn Storage>,
}

impl DeleteFiles {
    pub fn new(repository: Arc<dyn ResourceRepository>, storage: Arc<dyn Storage>) -> Self {
        Self {
            repository,
            storage,
        }
    }
}

#[async_trait]
impl Step<Resource> for DeleteFiles {
    async fn call(&self, input: Resource, _options: &StepOptions) -> anyhow::Result<Resource> {
        let file_set = input.as_file_set().ok_or_else(|| {
            AppError::InvalidInput(format!("{} {} is not a FileSet", input.kind(), input.id()))
        })?;

        let files = queries::find_files(self.repository.as_ref(), file_set).await?;
        for file in files {
            if !file.storage_key.is_empty() {
                self.storage
                    .delete(&file.storage_key)
                    .await
                    .with_context(|| format!("Failed to delete stored bytes of {}", file.id))?;
            }
            self.repository.delete(&file.id).await?;
            tracing::debug!(file_set_id = %file_set.id, file_id = %file.id, "File deleted");
        }

        Ok(input)
    }
}
