//! Step container
//!
//! Maps dotted step names (`work_resource.delete`) to step instances. Built
//! once at startup and read-only afterwards.

use reliquary_core::models::{Resource, ResourceKind};
use reliquary_db::ResourceRepository;
use reliquary_infra::Publisher;
use reliquary_storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;

use crate::step::Step;
use crate::steps::{DeleteAccessControl, DeleteFiles, DeleteResource};

pub struct Container<T> {
    steps: HashMap<String, Arc<dyn Step<T>>>,
}

impl<T: Send> Container<T> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register `step` under `name`, replacing any step already there.
    pub fn register(&mut self, name: impl Into<String>, step: Arc<dyn Step<T>>) -> &mut Self {
        let name = name.into();
        if self.steps.insert(name.clone(), step).is_some() {
            tracing::debug!(step = %name, "Replaced registered step");
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Step<T>>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T: Send> Default for Container<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Container holding every built-in destroy step.
pub fn default_container(
    repository: Arc<dyn ResourceRepository>,
    storage: Arc<dyn Storage>,
    publisher: Publisher,
) -> Container<Resource> {
    let mut container = Container::new();
    container
        .register(
            "work_resource.delete",
            Arc::new(DeleteResource::new(
                repository.clone(),
                publisher.clone(),
                ResourceKind::Work,
            )),
        )
        .register(
            "work_resource.delete_acl",
            Arc::new(DeleteAccessControl::new(repository.clone(), publisher.clone())),
        )
        .register(
            "file_set.delete",
            Arc::new(DeleteResource::new(
                repository.clone(),
                publisher.clone(),
                ResourceKind::FileSet,
            )),
        )
        .register(
            "file_set.delete_files",
            Arc::new(DeleteFiles::new(repository.clone(), storage)),
        )
        .register(
            "file_set.delete_acl",
            Arc::new(DeleteAccessControl::new(repository, publisher)),
        );
    container
}
