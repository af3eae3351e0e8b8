//! Ingest job
//!
//! Attaches a staged upload to its FileSet:
//!
//! 1. resolve the target FileSet and read the staged bytes
//! 2. characterize (failure is recorded on the FileMetadata, not raised)
//! 3. write the bytes under the FileMetadata's own key
//! 4. attach by use tag and commit FileSet + FileMetadata in one change set,
//!    deleting the FileMetadata it replaces
//! 5. reindex, publish, and schedule derivative generation
//!
//! Nothing is published unless the commit succeeded.

use super::{invalid_payload, job_failure, JobHandler};
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use reliquary_core::models::{
    CreateDerivativesPayload, FileMetadata, FileSet, IngestFilePayload, Job, JobType, ResourceId,
    UploadedFile, Use,
};
use reliquary_core::{AppError, EventPayload, JobEnqueuer};
use reliquary_db::{queries, ChangeSet, FileSetIndexer};
use reliquary_storage::keys;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub file_set: FileSet,
    pub file_metadata: FileMetadata,
    /// FileMetadata removed because it held the same use tag.
    pub replaced: Option<ResourceId>,
    pub derivatives_job_id: Uuid,
}

pub struct IngestJob;

impl IngestJob {
    #[tracing::instrument(
        skip(state, uploaded_file),
        fields(
            upload.id = %uploaded_file.id,
            file_set_id = tracing::field::Empty,
            use_tag = %use_tag
        )
    )]
    pub async fn perform(
        state: &AppState,
        uploaded_file: &UploadedFile,
        use_tag: Use,
    ) -> Result<IngestOutcome, AppError> {
        let file_set_id = uploaded_file
            .file_set_uri
            .as_ref()
            .ok_or_else(|| {
                AppError::not_found("FileSet", format!("<none for upload {}>", uploaded_file.id))
            })?;
        tracing::Span::current().record("file_set_id", file_set_id.as_str());

        let mut file_set = queries::find_file_set(state.repository.as_ref(), file_set_id).await?;
        let data = state.storage.download(&uploaded_file.storage_key).await?;

        let mut metadata = FileMetadata::new(
            file_set.id.clone(),
            &uploaded_file.filename,
            &uploaded_file.content_type,
            data.len() as u64,
            use_tag,
        );
        Self::characterize(state, uploaded_file, &data, &mut metadata).await;

        metadata.storage_key = keys::file_key(&file_set.id, &metadata.id, &uploaded_file.filename);
        state
            .storage
            .upload_with_key(&metadata.storage_key, data, &metadata.mime_type)
            .await?;

        let replaced_id = file_set.attach(&metadata);
        if metadata.is_original_file() {
            file_set.apply_default_title(&uploaded_file.filename);
        }
        if file_set.depositor.is_none() {
            file_set.depositor = Some(uploaded_file.user.user_key().to_string());
        }
        let replaced = match &replaced_id {
            Some(id) => Self::find_replaced(state, id).await?,
            None => None,
        };

        let mut changes = ChangeSet::new().save(file_set).save(metadata.clone());
        if let Some(id) = &replaced_id {
            changes = changes.delete(id.clone());
        }
        let saved = match state.repository.commit(changes).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "Commit failed, removing written payload");
                if let Err(cleanup) = state.storage.delete(&metadata.storage_key).await {
                    tracing::warn!(
                        storage_key = %metadata.storage_key,
                        error = %cleanup,
                        "Failed to remove orphaned payload"
                    );
                }
                return Err(e);
            }
        };
        let mut saved = saved.into_iter();
        let (file_set, metadata) = match (
            saved.next().and_then(|r| r.into_file_set()),
            saved.next().and_then(|r| r.into_file_metadata()),
        ) {
            (Some(fs), Some(fm)) => (fs, fm),
            _ => return Err(AppError::Internal("Commit returned unexpected resources".to_string())),
        };

        if let Some(old) = &replaced {
            if old.storage_key != metadata.storage_key && !old.storage_key.is_empty() {
                if let Err(e) = state.storage.delete(&old.storage_key).await {
                    tracing::warn!(
                        storage_key = %old.storage_key,
                        error = %e,
                        "Failed to delete replaced payload"
                    );
                }
            }
        }

        if let Err(e) = FileSetIndexer::index(state.search_index.as_ref(), &file_set).await {
            tracing::warn!(error = %e, "Failed to reindex FileSet after ingest");
        }

        Self::publish(state, uploaded_file, &file_set, &metadata);

        let payload = Job::payload_from(&CreateDerivativesPayload {
            file_set_id: file_set.id.clone(),
            use_tag,
        })?;
        let derivatives_job_id = state
            .job_queue
            .enqueue(JobType::CreateDerivatives, payload)
            .await
            .map_err(|e| AppError::Queue(format!("{:#}", e)))?;

        tracing::info!(
            file_metadata_id = %metadata.id,
            replaced = replaced_id.is_some(),
            derivatives_job_id = %derivatives_job_id,
            "File ingested"
        );

        Ok(IngestOutcome {
            file_set,
            file_metadata: metadata,
            replaced: replaced_id,
            derivatives_job_id,
        })
    }

    async fn characterize(
        state: &AppState,
        uploaded_file: &UploadedFile,
        data: &[u8],
        metadata: &mut FileMetadata,
    ) {
        let content_type =
            Some(uploaded_file.content_type.as_str()).filter(|ct| !ct.trim().is_empty());
        match state
            .characterizers
            .characterize(data, &uploaded_file.filename, content_type)
            .await
        {
            Ok(characterization) => metadata.record_characterization(characterization),
            Err(e) => {
                tracing::warn!(
                    filename = %uploaded_file.filename,
                    error = %e,
                    "Characterization failed"
                );
                metadata.record_characterization_failure(e.to_string());
            }
        }
    }

    /// The FileMetadata about to be replaced, if it still exists.
    async fn find_replaced(
        state: &AppState,
        id: &ResourceId,
    ) -> Result<Option<FileMetadata>, AppError> {
        match queries::find_file_metadata(state.repository.as_ref(), id).await {
            Ok(fm) => Ok(Some(fm)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn publish(
        state: &AppState,
        uploaded_file: &UploadedFile,
        file_set: &FileSet,
        metadata: &FileMetadata,
    ) {
        state.publisher.publish(EventPayload::FileUploaded {
            metadata: metadata.clone(),
            user: uploaded_file.user.clone(),
        });
        state.publisher.publish(EventPayload::MembershipUpdated {
            object: file_set.clone(),
            user: uploaded_file.user.clone(),
        });
        let follow_up = match metadata.characterization_status.failure_reason() {
            Some(reason) => EventPayload::CharacterizationFailed {
                metadata: metadata.clone(),
                reason: reason.to_string(),
            },
            None => EventPayload::MetadataUpdated {
                metadata: metadata.clone(),
            },
        };
        state.publisher.publish(follow_up);
    }
}

pub struct IngestFileJobHandler;

#[async_trait]
impl JobHandler for IngestFileJobHandler {
    #[tracing::instrument(skip(self, job, state), fields(job.id = %job.id))]
    async fn process(&self, job: &Job, state: Arc<AppState>) -> Result<serde_json::Value> {
        let payload: IngestFilePayload = job.try_payload_as().map_err(|e| invalid_payload(job, e))?;

        tracing::info!(
            upload_id = %payload.uploaded_file.id,
            filename = %payload.uploaded_file.filename,
            use_tag = %payload.use_tag,
            "Processing ingest job"
        );

        let outcome = IngestJob::perform(&state, &payload.uploaded_file, payload.use_tag)
            .await
            .map_err(job_failure)?;

        Ok(serde_json::to_value(&outcome)?)
    }
}
