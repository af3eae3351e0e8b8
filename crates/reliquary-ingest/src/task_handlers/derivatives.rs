//! Derivative job
//!
//! Generates renditions (thumbnail, extracted text) from a FileSet's original
//! file and attaches them under their derivative use tags. Generator and
//! storage problems are reported through `file.derivatives.failed` and the
//! outcome; only missing inputs and persistence failures fail the job.

use super::{delete_blobs, invalid_payload, job_failure, JobHandler};
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use reliquary_core::events::DerivativeRef;
use reliquary_core::models::{CreateDerivativesPayload, FileMetadata, FileSet, Job, ResourceId, Use};
use reliquary_core::{AppError, EventPayload};
use reliquary_db::{queries, ChangeSet, FileSetIndexer};
use reliquary_processing::{DerivativeFailure, MediaType, Rendition};
use reliquary_storage::keys;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct DerivativeOutcome {
    pub file_set_id: ResourceId,
    pub source_id: ResourceId,
    pub created: Vec<FileMetadata>,
    pub failures: Vec<DerivativeFailure>,
}

impl DerivativeOutcome {
    fn new(file_set_id: ResourceId, source_id: ResourceId) -> Self {
        Self {
            file_set_id,
            source_id,
            created: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn created_for(&self, use_tag: Use) -> Option<&FileMetadata> {
        self.created.iter().find(|fm| fm.use_tag == use_tag)
    }
}

/// Derivatives detached because their source is no longer attached.
#[derive(Default)]
struct Superseded {
    ids: Vec<ResourceId>,
    storage_keys: Vec<String>,
}

impl Superseded {
    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A rendition written to storage, waiting for the commit.
struct Stored {
    metadata: FileMetadata,
    replaced: Option<FileMetadata>,
}

pub struct CreateDerivativesJob;

impl CreateDerivativesJob {
    #[tracing::instrument(skip(state), fields(file_set_id = %file_set_id, use_tag = %use_tag))]
    pub async fn perform(
        state: &AppState,
        file_set_id: &ResourceId,
        use_tag: Use,
    ) -> Result<DerivativeOutcome, AppError> {
        let repository = state.repository.as_ref();
        let mut file_set = queries::find_file_set(repository, file_set_id).await?;
        let source = queries::find_file_metadata_by_use(repository, &file_set, use_tag)
            .await?
            .ok_or_else(|| AppError::SourceNotFound {
                file_set_id: file_set_id.to_string(),
                use_tag: use_tag.to_string(),
            })?;

        let mut outcome = DerivativeOutcome::new(file_set.id.clone(), source.id.clone());
        if use_tag != Use::OriginalFile {
            tracing::debug!("Derivatives are only generated from original files");
            return Ok(outcome);
        }

        let data = state.storage.download(&source.storage_key).await?;
        let media_type = MediaType::detect(
            Some(source.mime_type.as_str()),
            &data,
            &source.original_filename,
        );
        let generators = state.derivatives.generators_for(use_tag, media_type);
        if generators.is_empty() {
            tracing::info!(
                media_type = %media_type,
                mime_type = %source.mime_type,
                "No derivative generator applies"
            );
            outcome.failures.push(DerivativeFailure::Unsupported {
                use_tag,
                media_type,
                mime_type: source.mime_type.clone(),
            });
        }

        // One rendition per use tag; a later generator wins.
        let mut renditions: BTreeMap<Use, Rendition> = BTreeMap::new();
        for generator in generators {
            match generator.generate(&data, &source.mime_type).await {
                Ok(produced) => {
                    for rendition in produced {
                        if let Some(previous) = renditions.insert(rendition.use_tag, rendition) {
                            tracing::warn!(
                                use_tag = %previous.use_tag,
                                name = %previous.name,
                                "Rendition superseded by a later generator"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        error = %e,
                        "Derivative generator failed"
                    );
                    outcome.failures.push(DerivativeFailure::Generator {
                        generator: generator.name().to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let superseded = Self::detach_superseded(state, &mut file_set, &source).await?;

        let mut stored = Vec::with_capacity(renditions.len());
        for rendition in renditions.into_values() {
            match Self::store(state, &mut file_set, &source, rendition).await {
                Ok(entry) => stored.push(entry),
                Err(failure) => outcome.failures.push(failure),
            }
        }

        if stored.is_empty() && superseded.is_empty() {
            Self::publish_failures(state, &outcome);
            return Ok(outcome);
        }

        let mut changes = ChangeSet::new().save(file_set);
        for id in &superseded.ids {
            changes = changes.delete(id.clone());
        }
        for entry in &stored {
            changes = changes.save(entry.metadata.clone());
            if let Some(old) = &entry.replaced {
                changes = changes.delete(old.id.clone());
            }
        }
        let saved = match state.repository.commit(changes).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "Commit failed, removing written renditions");
                let written = stored
                    .iter()
                    .map(|entry| entry.metadata.storage_key.clone())
                    .collect();
                delete_blobs(state.storage.as_ref(), written, "orphaned rendition").await;
                return Err(e);
            }
        };

        let mut saved = saved.into_iter();
        let file_set = saved
            .next()
            .and_then(|r| r.into_file_set())
            .ok_or_else(|| {
                AppError::Internal("Commit returned unexpected resources".to_string())
            })?;
        outcome.created = saved.filter_map(|r| r.into_file_metadata()).collect();

        let mut obsolete = superseded.storage_keys;
        obsolete.extend(
            stored
                .iter()
                .filter_map(|entry| entry.replaced.as_ref())
                .map(|old| old.storage_key.clone()),
        );
        delete_blobs(state.storage.as_ref(), obsolete, "replaced rendition").await;

        FileSetIndexer::index(state.search_index.as_ref(), &file_set).await?;

        if !outcome.created.is_empty() {
            state.publisher.publish(EventPayload::DerivativesCreated {
                file_set_id: file_set.id.clone(),
                source_id: source.id.clone(),
                derivatives: outcome
                    .created
                    .iter()
                    .map(|fm| DerivativeRef {
                        id: fm.id.clone(),
                        use_tag: fm.use_tag,
                        storage_key: fm.storage_key.clone(),
                    })
                    .collect(),
            });
        }
        Self::publish_failures(state, &outcome);

        tracing::info!(
            created = outcome.created.len(),
            removed = superseded.ids.len(),
            failures = outcome.failures.len(),
            "Derivatives created"
        );
        Ok(outcome)
    }

    /// Detach derivatives generated from a file other than `source`, such as
    /// the renditions of an original that has since been replaced. Files
    /// uploaded directly under a derivative use are left alone.
    async fn detach_superseded(
        state: &AppState,
        file_set: &mut FileSet,
        source: &FileMetadata,
    ) -> Result<Superseded, AppError> {
        let mut superseded = Superseded::default();
        let candidates: Vec<(Use, ResourceId)> = file_set
            .files_by_use
            .iter()
            .filter(|(use_tag, _)| use_tag.is_derivative())
            .map(|(use_tag, id)| (*use_tag, id.clone()))
            .collect();

        for (use_tag, id) in candidates {
            let found = queries::find_file_metadata(state.repository.as_ref(), &id).await;
            let storage_key = match found {
                Ok(fm) if fm.is_derivative() && !fm.is_derived_from(&source.id) => {
                    Some(fm.storage_key)
                }
                Ok(_) => continue,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            file_set.detach(use_tag);
            tracing::debug!(file_id = %id, use_tag = %use_tag, "Detaching superseded derivative");
            superseded.ids.push(id);
            superseded.storage_keys.extend(storage_key);
        }
        Ok(superseded)
    }

    /// Write one rendition and attach it to `file_set`.
    async fn store(
        state: &AppState,
        file_set: &mut FileSet,
        source: &FileMetadata,
        rendition: Rendition,
    ) -> Result<Stored, DerivativeFailure> {
        let filename = rendition.filename_for(&source.original_filename);
        let mut metadata = FileMetadata::new(
            file_set.id.clone(),
            &filename,
            &rendition.mime_type,
            rendition.size_bytes(),
            rendition.use_tag,
        );
        metadata.derived_from = Some(source.id.clone());
        metadata.storage_key =
            keys::derivative_key(&metadata.id, &rendition.name, &rendition.extension);

        match state
            .characterizers
            .characterize(&rendition.bytes, &filename, Some(rendition.mime_type.as_str()))
            .await
        {
            Ok(characterization) => metadata.record_characterization(characterization),
            Err(e) => metadata.record_characterization_failure(e.to_string()),
        }

        if let Err(e) = state
            .storage
            .upload_with_key(
                &metadata.storage_key,
                rendition.bytes.to_vec(),
                &rendition.mime_type,
            )
            .await
        {
            tracing::warn!(name = %rendition.name, error = %e, "Failed to store rendition");
            return Err(DerivativeFailure::Storage {
                name: rendition.name,
                reason: e.to_string(),
            });
        }

        let replaced = match file_set.attach(&metadata) {
            Some(id) => match queries::find_file_metadata(state.repository.as_ref(), &id).await {
                Ok(old) => Some(old),
                Err(e) => {
                    tracing::debug!(
                        file_id = %id,
                        error = %e,
                        "Replaced rendition is already gone"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Stored { metadata, replaced })
    }

    fn publish_failures(state: &AppState, outcome: &DerivativeOutcome) {
        if outcome.failures.is_empty() {
            return;
        }
        let reason = outcome
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        state.publisher.publish(EventPayload::DerivativesFailed {
            file_set_id: outcome.file_set_id.clone(),
            source_id: Some(outcome.source_id.clone()),
            reason,
        });
    }
}

pub struct CreateDerivativesJobHandler;

#[async_trait]
impl JobHandler for CreateDerivativesJobHandler {
    #[tracing::instrument(skip(self, job, state), fields(job.id = %job.id))]
    async fn process(&self, job: &Job, state: Arc<AppState>) -> Result<serde_json::Value> {
        let payload: CreateDerivativesPayload =
            job.try_payload_as().map_err(|e| invalid_payload(job, e))?;

        let outcome = CreateDerivativesJob::perform(&state, &payload.file_set_id, payload.use_tag)
            .await
            .map_err(job_failure)?;

        Ok(serde_json::to_value(&outcome)?)
    }
}
