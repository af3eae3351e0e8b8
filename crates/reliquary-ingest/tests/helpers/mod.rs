#![allow(dead_code)]

pub mod failing;
pub mod fixtures;

use reliquary_core::models::{FileSet, JobStatus, ResourceId, UploadedFile, User};
use reliquary_core::Config;
use reliquary_db::{
    InMemoryResourceRepository, InMemorySearchIndex, JobRepository, ResourceRepository,
};
use reliquary_infra::{Publisher, RecordingListener};
use reliquary_ingest::{
    build_state_without_worker, stage_upload, start_services, AppState, ServiceParts,
};
use reliquary_storage::MemoryStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const TEST_USER: &str = "depositor@example.org";

/// State and direct handles on every in-memory backend behind it.
pub struct TestEnv {
    pub state: Arc<AppState>,
    pub repository: Arc<dyn ResourceRepository>,
    pub storage: MemoryStorage,
    pub search_index: InMemorySearchIndex,
    pub jobs: JobRepository,
    pub events: Arc<RecordingListener>,
    pub job_finished_rx: Option<mpsc::Receiver<(Uuid, JobStatus)>>,
}

struct Backends {
    parts: ServiceParts,
    storage: MemoryStorage,
    search_index: InMemorySearchIndex,
    jobs: JobRepository,
    events: Arc<RecordingListener>,
}

fn backends(repository: Arc<dyn ResourceRepository>) -> Backends {
    let storage = MemoryStorage::new();
    let search_index = InMemorySearchIndex::new();
    let jobs = JobRepository::new();
    let events = Arc::new(RecordingListener::new());
    let publisher = Publisher::new();
    publisher.subscribe(events.clone());

    let parts = ServiceParts {
        repository,
        storage: Arc::new(storage.clone()),
        search_index: Arc::new(search_index.clone()),
        publisher,
        jobs: jobs.clone(),
    };
    Backends {
        parts,
        storage,
        search_index,
        jobs,
        events,
    }
}

/// Environment whose queue records jobs without running them.
pub fn setup_test_env() -> TestEnv {
    setup_test_env_with(Arc::new(InMemoryResourceRepository::new()))
}

pub fn setup_test_env_with(repository: Arc<dyn ResourceRepository>) -> TestEnv {
    let config = Config::for_tests();
    let b = backends(repository.clone());
    let state = build_state_without_worker(&config, b.parts);
    TestEnv {
        state,
        repository,
        storage: b.storage,
        search_index: b.search_index,
        jobs: b.jobs,
        events: b.events,
        job_finished_rx: None,
    }
}

/// Environment with a running worker pool.
pub fn setup_running_env() -> TestEnv {
    setup_running_env_with(Arc::new(InMemoryResourceRepository::new()), Config::for_tests())
}

pub fn setup_running_env_with(repository: Arc<dyn ResourceRepository>, config: Config) -> TestEnv {
    let b = backends(repository.clone());
    let services = start_services(&config, b.parts);
    TestEnv {
        state: services.state,
        repository,
        storage: b.storage,
        search_index: b.search_index,
        jobs: b.jobs,
        events: b.events,
        job_finished_rx: Some(services.job_finished_rx),
    }
}

impl TestEnv {
    pub fn user(&self) -> User {
        User::new(TEST_USER)
    }

    /// Save an empty, untitled FileSet.
    pub async fn create_file_set(&self) -> FileSet {
        self.repository
            .save(FileSet::new().into())
            .await
            .expect("save file set")
            .into_file_set()
            .expect("saved a file set")
    }

    pub async fn file_set(&self, id: &ResourceId) -> FileSet {
        reliquary_db::queries::find_file_set(self.repository.as_ref(), id)
            .await
            .expect("file set exists")
    }

    pub async fn stage(
        &self,
        file_set_id: &ResourceId,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> UploadedFile {
        stage_upload(
            &self.state,
            self.user(),
            file_set_id.clone(),
            filename,
            content_type,
            data,
        )
        .await
        .expect("stage upload")
    }

    /// Wait until `count` jobs have reached a terminal status.
    pub async fn wait_for_jobs(&mut self, count: usize) -> Vec<(Uuid, JobStatus)> {
        let rx = self
            .job_finished_rx
            .as_mut()
            .expect("environment has a running worker");
        let mut finished = Vec::with_capacity(count);
        while finished.len() < count {
            let next = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for jobs")
                .expect("job channel closed");
            finished.push(next);
        }
        finished
    }
}
