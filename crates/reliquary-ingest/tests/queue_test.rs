mod helpers;

use helpers::failing::FailingRepository;
use helpers::fixtures::create_test_png;
use helpers::{setup_running_env, setup_running_env_with};
use reliquary_core::models::{JobStatus, JobType, Priority, ResourceId, Use};
use reliquary_core::{Config, EventName};
use reliquary_db::{InMemoryResourceRepository, ResourceRepository};
use reliquary_ingest::submit_ingest;
use serde_json::json;
use std::sync::Arc;

/// An ingest job runs, schedules derivatives, and both complete.
#[tokio::test]
async fn test_ingest_and_derivatives_run_to_completion() {
    let mut env = setup_running_env();
    let file_set = env.create_file_set().await;
    let upload = env
        .stage(&file_set.id, "image.png", "image/png", create_test_png(300, 300))
        .await;

    let ingest_job_id = submit_ingest(&env.state, upload, Use::OriginalFile)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(2).await;

    assert!(finished.iter().all(|(_, status)| *status == JobStatus::Completed));
    assert_eq!(finished[0].0, ingest_job_id);

    let ingest_job = env.jobs.get_job(ingest_job_id).await.unwrap().unwrap();
    let outcome: serde_json::Value = ingest_job.result.clone().unwrap();
    assert_eq!(outcome["file_metadata"]["original_filename"], "image.png");
    assert_eq!(outcome["derivatives_job_id"], json!(finished[1].0));

    let stored = env.file_set(&file_set.id).await;
    assert!(stored.original_file_id().is_some());
    assert!(stored.thumbnail_id().is_some());
    assert_eq!(env.events.count(EventName::DerivativesCreated), 1);
}

/// A derivative that cannot be made leaves the ingest successful.
#[tokio::test]
async fn test_derivative_failure_does_not_fail_ingest() {
    let mut env = setup_running_env();
    let file_set = env.create_file_set().await;
    let upload = env
        .stage(&file_set.id, "broken.png", "image/png", b"not a png at all".to_vec())
        .await;

    submit_ingest(&env.state, upload, Use::OriginalFile)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(2).await;

    assert!(finished.iter().all(|(_, status)| *status == JobStatus::Completed));
    assert_eq!(env.events.count(EventName::FileUploaded), 1);
    assert_eq!(env.events.count(EventName::DerivativesFailed), 1);

    let stored = env.file_set(&file_set.id).await;
    assert_eq!(stored.file_ids.len(), 1);
}

/// A rejected commit is retried and the job then succeeds.
#[tokio::test]
async fn test_recoverable_failure_is_retried() {
    let repository = Arc::new(FailingRepository::new(InMemoryResourceRepository::new()));
    let mut env = setup_running_env_with(repository.clone(), Config::for_tests());
    let file_set = env.create_file_set().await;
    let upload = env
        .stage(&file_set.id, "notes.txt", "text/plain", b"hello".to_vec())
        .await;

    repository.fail_next_commits(1);
    let job_id = submit_ingest(&env.state, upload, Use::OriginalFile)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(2).await;

    assert!(finished.iter().all(|(_, status)| *status == JobStatus::Completed));
    let job = env.jobs.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.retry_count, 1);
    let result = job.result.unwrap();
    assert_eq!(result["file_set"]["id"], json!(file_set.id.as_str()));

    // One failed attempt, the successful retry, and the derivative job's commit.
    assert_eq!(repository.commit_attempts(), 3);
    assert_eq!(env.events.count(EventName::FileUploaded), 1);
}

/// Missing targets fail at once without retries or follow-up jobs.
#[tokio::test]
async fn test_unrecoverable_failure_is_not_retried() {
    let mut env = setup_running_env();
    let upload = env
        .stage(&ResourceId::new("missing"), "image.png", "image/png", create_test_png(8, 8))
        .await;

    let job_id = submit_ingest(&env.state, upload, Use::OriginalFile)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(1).await;

    assert_eq!(finished, vec![(job_id, JobStatus::Failed)]);
    let job = env.jobs.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.result.as_ref().unwrap()["unrecoverable"], json!(true));
    assert_eq!(env.jobs.list_jobs(None).await.unwrap().len(), 1);
    assert!(env.events.events().is_empty());
}

/// A payload that does not parse fails without retries.
#[tokio::test]
async fn test_invalid_payload_is_not_retried() {
    let mut env = setup_running_env();

    let job_id = env
        .state
        .job_queue
        .submit_job(JobType::IngestFile, json!({"unexpected": true}), Priority::High, None)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(1).await;

    assert_eq!(finished, vec![(job_id, JobStatus::Failed)]);
    let job = env.jobs.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.retry_count, 0);
}

fn busy_queue_config() -> Config {
    let mut config = Config::for_tests();
    config.job_queue_max_workers = 4;
    config.job_queue_max_retries = 5;
    config
}

/// Ingests of different uses on one FileSet, run side by side, both land.
#[tokio::test]
async fn test_concurrent_ingests_of_different_uses_all_land() {
    let repository = Arc::new(InMemoryResourceRepository::new());
    let mut env = setup_running_env_with(repository, busy_queue_config());
    let file_set = env.create_file_set().await;
    let original = env
        .stage(&file_set.id, "scan.png", "image/png", create_test_png(64, 64))
        .await;
    let thumbnail = env
        .stage(&file_set.id, "thumb.png", "image/png", create_test_png(16, 16))
        .await;

    let original_job = submit_ingest(&env.state, original, Use::OriginalFile)
        .await
        .unwrap();
    let thumbnail_job = submit_ingest(&env.state, thumbnail, Use::Thumbnail)
        .await
        .unwrap();
    let finished = env.wait_for_jobs(4).await;

    assert!(finished.iter().all(|(_, status)| *status == JobStatus::Completed));
    let stored = env.file_set(&file_set.id).await;
    assert_eq!(stored.file_ids.len(), 2);
    assert!(stored.is_consistent());

    let job = env.jobs.get_job(original_job).await.unwrap().unwrap();
    let original_id = job.result.unwrap()["file_metadata"]["id"].clone();
    assert_eq!(
        stored.original_file_id().map(|id| id.as_str()),
        original_id.as_str()
    );
    assert!(stored.thumbnail_id().is_some());
    let job = env.jobs.get_job(thumbnail_job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(env.events.count(EventName::FileUploaded), 2);
}

/// Two originals racing for the same FileSet: the later commit wins and the
/// earlier file is dropped rather than duplicated.
#[tokio::test]
async fn test_concurrent_originals_last_writer_wins() {
    let repository = Arc::new(InMemoryResourceRepository::new());
    let mut env = setup_running_env_with(repository, busy_queue_config());
    let file_set = env.create_file_set().await;
    let first = env
        .stage(&file_set.id, "first.png", "image/png", create_test_png(32, 32))
        .await;
    let second = env
        .stage(&file_set.id, "second.png", "image/png", create_test_png(48, 48))
        .await;

    let mut ingest_jobs = Vec::new();
    for upload in [first, second] {
        ingest_jobs.push(
            submit_ingest(&env.state, upload, Use::OriginalFile)
                .await
                .unwrap(),
        );
    }
    let finished = env.wait_for_jobs(4).await;
    assert!(finished.iter().all(|(_, status)| *status == JobStatus::Completed));

    let stored = env.file_set(&file_set.id).await;
    assert!(stored.is_consistent());
    assert_eq!(stored.file_ids.len(), 2);
    let original_id = stored.original_file_id().unwrap().clone();

    let mut surviving = 0;
    for job_id in ingest_jobs {
        let job = env.jobs.get_job(job_id).await.unwrap().unwrap();
        let id = job.result.unwrap()["file_metadata"]["id"].clone();
        let id = ResourceId::new(id.as_str().unwrap());
        match env.repository.find_by(&id).await {
            Ok(_) => {
                assert_eq!(id, original_id);
                surviving += 1;
            }
            Err(e) => assert!(e.is_not_found()),
        }
    }
    assert_eq!(surviving, 1);

    let thumbnail_id = stored.thumbnail_id().unwrap();
    let thumbnail = env
        .repository
        .find_by(thumbnail_id)
        .await
        .unwrap()
        .into_file_metadata()
        .unwrap();
    assert!(thumbnail.is_derived_from(&original_id));
}
