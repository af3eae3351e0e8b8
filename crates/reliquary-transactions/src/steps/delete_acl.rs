use async_trait::async_trait;
use reliquary_core::models::Resource;
use reliquary_core::EventPayload;
use reliquary_db::ResourceRepository;
use reliquary_infra::Publisher;
use std::sync::Arc;

use crate::step::{Step, StepOptions};

/// Deletes every AccessControl pointing at the resource. Publishes
/// `object.acl.deleted` once per ACL.
pub struct DeleteAccessControl {
    repository: Arc<dyn ResourceRepository>,
    publisher: Publisher,
}

impl DeleteAccessControl {
    pub fn new(repository: Arc<dyn ResourceRepository>, publisher: Publisher) -> Self {
        Self {
            repository,
            publisher,
        }
    }
}

#[async_trait]
impl Step<Resource> for DeleteAccessControl {
    async fn call(&self, input: Resource, _options: &StepOptions) -> anyhow::Result<Resource> {
        let acls = self.repository.find_access_controls_for(input.id()).await?;

        for acl in acls {
            self.repository.delete(&acl.id).await?;
            self.publisher.publish(EventPayload::AclDeleted {
                id: acl.id,
                access_to: acl.access_to,
            });
        }

        Ok(input)
    }
}
