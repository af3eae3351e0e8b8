use async_trait::async_trait;
use reliquary_core::models::{AccessControl, Resource, ResourceId, ResourceKind};
use reliquary_core::AppError;
use reliquary_db::{ChangeSet, InMemoryResourceRepository, ResourceRepository};
use std::sync::atomic::{AtomicU32, Ordering};

/// Gateway that rejects the next `n` commits before delegating.
#[derive(Default)]
pub struct FailingRepository {
    pub inner: InMemoryResourceRepository,
    failing_commits: AtomicU32,
    commit_attempts: AtomicU32,
}

impl FailingRepository {
    pub fn new(inner: InMemoryResourceRepository) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub fn commit_attempts(&self) -> u32 {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceRepository for FailingRepository {
    async fn find_by(&self, id: &ResourceId) -> Result<Resource, AppError> {
        self.inner.find_by(id).await
    }

    async fn save(&self, resource: Resource) -> Result<Resource, AppError> {
        self.inner.save(resource).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<Option<Resource>, AppError> {
        self.inner.delete(id).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<Vec<Resource>, AppError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AppError::Persistence("injected commit failure".to_string()));
        }
        self.inner.commit(changes).await
    }

    async fn find_access_controls_for(
        &self,
        id: &ResourceId,
    ) -> Result<Vec<AccessControl>, AppError> {
        self.inner.find_access_controls_for(id).await
    }

    async fn find_all_of_kind(&self, kind: ResourceKind) -> Result<Vec<Resource>, AppError> {
        self.inner.find_all_of_kind(kind).await
    }
}
