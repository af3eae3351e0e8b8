mod helpers;

use helpers::fixtures::create_test_png;
use helpers::setup_test_env;
use reliquary_core::models::{AccessControl, ResourceKind, Use, Work};
use reliquary_core::EventName;
use reliquary_db::{ResourceRepository, SearchIndex};
use reliquary_ingest::{CreateDerivativesJob, IngestJob};

/// Destroying a FileSet removes its files, blobs, ACLs and index document.
#[tokio::test]
async fn test_destroy_file_set_removes_everything() {
    let env = setup_test_env();
    let file_set = env.create_file_set().await;
    let upload = env
        .stage(&file_set.id, "image.png", "image/png", create_test_png(64, 32))
        .await;
    IngestJob::perform(&env.state, &upload, Use::OriginalFile)
        .await
        .unwrap();
    CreateDerivativesJob::perform(&env.state, &file_set.id, Use::OriginalFile)
        .await
        .unwrap();
    env.repository
        .save(AccessControl::new(file_set.id.clone()).into())
        .await
        .unwrap();
    env.events.clear();

    env.state
        .destroy_file_set(&file_set.id, Some(env.user()))
        .await
        .unwrap();

    assert!(env.repository.find_by(&file_set.id).await.unwrap_err().is_not_found());
    for kind in [ResourceKind::FileMetadata, ResourceKind::AccessControl] {
        assert!(env.repository.find_all_of_kind(kind).await.unwrap().is_empty());
    }
    // Only the staged upload is left in storage.
    assert_eq!(env.storage.keys().await, vec![upload.storage_key.clone()]);
    assert!(env.search_index.find(&file_set.id).await.unwrap().is_none());

    let deleted = env.events.events_named(EventName::ObjectDeleted);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].user().map(|u| u.email.as_str()), Some(helpers::TEST_USER));
    assert_eq!(env.events.count(EventName::AclDeleted), 1);
}

/// Destroying a Work through the wrong kind of id fails and deletes nothing.
#[tokio::test]
async fn test_destroy_work_rejects_other_kinds() {
    let env = setup_test_env();
    let file_set = env.create_file_set().await;

    assert!(env.state.destroy_work(&file_set.id, None).await.is_err());
    assert!(env.repository.find_by(&file_set.id).await.is_ok());

    let work = Work::new("Field notes");
    env.repository.save(work.clone().into()).await.unwrap();
    env.state.destroy_work(&work.id, None).await.unwrap();
    assert!(env.repository.find_by(&work.id).await.is_err());
}
