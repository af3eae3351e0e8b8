//! Persistence gateway
//!
//! Every write is checked against the stored `lock_version`: a resource saved
//! from a stale read is rejected with [`AppError::PersistenceConflict`] and
//! nothing is written. A [`ChangeSet`] applies all of its saves and deletes
//! under one lock, or none of them.

use async_trait::async_trait;
use chrono::Utc;
use reliquary_core::models::{AccessControl, Resource, ResourceId, ResourceKind};
use reliquary_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resources to save and ids to delete in one atomic write.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub save: Vec<Resource>,
    pub delete: Vec<ResourceId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(mut self, resource: impl Into<Resource>) -> Self {
        self.save.push(resource.into());
        self
    }

    pub fn delete(mut self, id: ResourceId) -> Self {
        self.delete.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.save.is_empty() && self.delete.is_empty()
    }
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Fetch a resource, failing with NotFound when it does not exist.
    async fn find_by(&self, id: &ResourceId) -> Result<Resource, AppError>;

    /// Create or update one resource. Returns the stored copy with its bumped
    /// lock version.
    async fn save(&self, resource: Resource) -> Result<Resource, AppError>;

    /// Delete a resource. Deleting a missing id is not an error.
    async fn delete(&self, id: &ResourceId) -> Result<Option<Resource>, AppError>;

    /// Apply every save and delete atomically. Returns the saved resources in
    /// the order given.
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<Resource>, AppError>;

    async fn find_access_controls_for(
        &self,
        id: &ResourceId,
    ) -> Result<Vec<AccessControl>, AppError>;

    async fn find_all_of_kind(&self, kind: ResourceKind) -> Result<Vec<Resource>, AppError>;
}

/// In-process gateway backed by a map of resources.
#[derive(Clone, Default)]
pub struct InMemoryResourceRepository {
    resources: Arc<RwLock<HashMap<ResourceId, Resource>>>,
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources of every kind.
    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    fn check_lock(
        stored: &HashMap<ResourceId, Resource>,
        incoming: &Resource,
    ) -> Result<(), AppError> {
        if let Some(existing) = stored.get(incoming.id()) {
            if existing.kind() != incoming.kind() {
                return Err(AppError::Persistence(format!(
                    "{} {} cannot be overwritten by a {}",
                    existing.kind(),
                    incoming.id(),
                    incoming.kind()
                )));
            }
            if existing.lock_version() != incoming.lock_version() {
                return Err(AppError::PersistenceConflict {
                    id: incoming.id().to_string(),
                    expected: incoming.lock_version(),
                    found: existing.lock_version(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn find_by(&self, id: &ResourceId) -> Result<Resource, AppError> {
        self.resources
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Resource", id))
    }

    #[tracing::instrument(
        skip(self, resource),
        fields(id = %resource.id(), kind = %resource.kind())
    )]
    async fn save(&self, mut resource: Resource) -> Result<Resource, AppError> {
        let mut resources = self.resources.write().await;
        Self::check_lock(&resources, &resource)?;

        resource.mark_saved(Utc::now());
        resources.insert(resource.id().clone(), resource.clone());

        tracing::debug!(lock_version = resource.lock_version(), "Resource saved");
        Ok(resource)
    }

    async fn delete(&self, id: &ResourceId) -> Result<Option<Resource>, AppError> {
        let removed = self.resources.write().await.remove(id);
        if let Some(resource) = &removed {
            tracing::debug!(id = %id, kind = %resource.kind(), "Resource deleted");
        }
        Ok(removed)
    }

    #[tracing::instrument(
        skip(self, changes),
        fields(saves = changes.save.len(), deletes = changes.delete.len())
    )]
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<Resource>, AppError> {
        let mut resources = self.resources.write().await;

        for resource in &changes.save {
            Self::check_lock(&resources, resource)?;
            if changes.delete.contains(resource.id()) {
                return Err(AppError::Persistence(format!(
                    "{} is both saved and deleted in one change set",
                    resource.id()
                )));
            }
        }

        let now = Utc::now();
        let mut saved = Vec::with_capacity(changes.save.len());
        for mut resource in changes.save {
            resource.mark_saved(now);
            resources.insert(resource.id().clone(), resource.clone());
            saved.push(resource);
        }
        for id in &changes.delete {
            resources.remove(id);
        }

        tracing::debug!("Change set committed");
        Ok(saved)
    }

    async fn find_access_controls_for(
        &self,
        id: &ResourceId,
    ) -> Result<Vec<AccessControl>, AppError> {
        let resources = self.resources.read().await;
        let mut acls: Vec<AccessControl> = resources
            .values()
            .filter_map(|r| match r {
                Resource::AccessControl(acl) if &acl.access_to == id => Some(acl.clone()),
                _ => None,
            })
            .collect();
        acls.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(acls)
    }

    async fn find_all_of_kind(&self, kind: ResourceKind) -> Result<Vec<Resource>, AppError> {
        let resources = self.resources.read().await;
        let mut found: Vec<Resource> = resources
            .values()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_core::models::{FileMetadata, FileSet, Use, Work};
    use reliquary_core::ErrorKind;

    #[tokio::test]
    async fn save_bumps_lock_version_and_find_returns_it() {
        let repo = InMemoryResourceRepository::new();
        let saved = repo.save(FileSet::new().into()).await.unwrap();
        assert_eq!(saved.lock_version(), 1);

        let found = repo.find_by(saved.id()).await.unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let repo = InMemoryResourceRepository::new();
        let err = repo.find_by(&ResourceId::new("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let repo = InMemoryResourceRepository::new();
        let first = repo.save(FileSet::new().into()).await.unwrap();
        let stale = first.clone();

        repo.save(first).await.unwrap();
        let err = repo.save(stale).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::PersistenceConflict {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let repo = InMemoryResourceRepository::new();
        let fs = repo
            .save(FileSet::new().into())
            .await
            .unwrap()
            .into_file_set()
            .unwrap();
        // Move the stored copy ahead so `fs` becomes stale.
        repo.save(fs.clone().into()).await.unwrap();

        let fm = FileMetadata::new(fs.id.clone(), "a.png", "image/png", 1, Use::OriginalFile);
        let result = repo
            .commit(ChangeSet::new().save(fm.clone()).save(fs))
            .await;

        assert!(result.is_err());
        assert!(repo.find_by(&fm.id).await.is_err());
    }

    #[tokio::test]
    async fn commit_saves_and_deletes() {
        let repo = InMemoryResourceRepository::new();
        let old = repo.save(Work::new("old").into()).await.unwrap();
        let new = Work::new("new");

        let saved = repo
            .commit(ChangeSet::new().save(new.clone()).delete(old.id().clone()))
            .await
            .unwrap();

        assert_eq!(saved.len(), 1);
        assert!(repo.find_by(&new.id).await.is_ok());
        assert!(repo.find_by(old.id()).await.is_err());
    }

    #[tokio::test]
    async fn acls_are_found_by_target() {
        let repo = InMemoryResourceRepository::new();
        let work = Work::new("w");
        let acl = AccessControl::new(work.id.clone());
        repo.save(work.clone().into()).await.unwrap();
        repo.save(acl.clone().into()).await.unwrap();
        repo.save(AccessControl::new(ResourceId::new("other")).into())
            .await
            .unwrap();

        let found = repo.find_access_controls_for(&work.id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, acl.id);
        assert_eq!(
            repo.find_all_of_kind(ResourceKind::AccessControl)
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
