use async_trait::async_trait;
use reliquary_core::models::{Resource, ResourceKind};
use reliquary_core::{AppError, EventPayload};
use reliquary_db::ResourceRepository;
use reliquary_infra::Publisher;
use std::sync::Arc;

use crate::step::{Step, StepOptions};

/// Deletes the resource itself and publishes `object.deleted`.
///
/// Rejects resources of any kind other than the one it was built for. A
/// resource that is already gone counts as deleted, without a second event.
pub struct DeleteResource {
    repository: Arc<dyn ResourceRepository>,
    publisher: Publisher,
    kind: ResourceKind,
}

impl DeleteResource {
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        publisher: Publisher,
        kind: ResourceKind,
    ) -> Self {
        Self {
            repository,
            publisher,
            kind,
        }
    }
}

#[async_trait]
impl Step<Resource> for DeleteResource {
    async fn call(&self, input: Resource, options: &StepOptions) -> anyhow::Result<Resource> {
        if input.kind() != self.kind {
            return Err(AppError::InvalidInput(format!(
                "Expected a {} but got {} {}",
                self.kind,
                input.kind(),
                input.id()
            ))
            .into());
        }

        if self.repository.delete(input.id()).await?.is_none() {
            tracing::debug!(id = %input.id(), kind = %self.kind, "Resource already deleted");
            return Ok(input);
        }

        tracing::info!(id = %input.id(), kind = %self.kind, "Resource deleted");
        self.publisher.publish(EventPayload::ObjectDeleted {
            id: input.id().clone(),
            user: options.user.clone(),
        });

        Ok(input)
    }
}
