//! Staging uploads and scheduling their ingest.

use reliquary_core::models::{IngestFilePayload, Job, JobType, ResourceId, UploadedFile, Use, User};
use reliquary_core::{AppError, JobEnqueuer};
use reliquary_storage::keys;
use uuid::Uuid;

use crate::state::AppState;

/// Write `data` to the staging area and return the upload record pointing at it.
#[tracing::instrument(skip(state, user, data), fields(size_bytes = data.len()))]
pub async fn stage_upload(
    state: &AppState,
    user: User,
    file_set_id: ResourceId,
    filename: &str,
    content_type: &str,
    data: Vec<u8>,
) -> Result<UploadedFile, AppError> {
    if filename.trim().is_empty() {
        return Err(AppError::InvalidInput("Upload has no filename".to_string()));
    }
    if data.len() > state.config.max_upload_size_bytes {
        return Err(AppError::InvalidInput(format!(
            "{} is {} bytes, the limit is {}",
            filename,
            data.len(),
            state.config.max_upload_size_bytes
        )));
    }

    let mut uploaded = UploadedFile::new(
        user,
        Some(file_set_id),
        filename,
        content_type,
        String::new(),
        data.len() as u64,
    );
    uploaded.storage_key = keys::upload_key(uploaded.id, filename);
    state
        .storage
        .upload_with_key(&uploaded.storage_key, data, content_type)
        .await?;

    tracing::debug!(upload_id = %uploaded.id, storage_key = %uploaded.storage_key, "Upload staged");
    Ok(uploaded)
}

/// Queue an ingest job for a staged upload.
pub async fn submit_ingest(
    state: &AppState,
    uploaded_file: UploadedFile,
    use_tag: Use,
) -> Result<Uuid, AppError> {
    let payload = Job::payload_from(&IngestFilePayload {
        uploaded_file,
        use_tag,
    })?;
    state
        .job_queue
        .enqueue(JobType::IngestFile, payload)
        .await
        .map_err(|e| AppError::Queue(format!("{:#}", e)))
}
