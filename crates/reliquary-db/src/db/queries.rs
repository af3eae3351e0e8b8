//! Typed lookups over the persistence gateway.

use reliquary_core::models::{FileMetadata, FileSet, Resource, ResourceId, ResourceKind, Use, Work};
use reliquary_core::AppError;

use super::resources::ResourceRepository;

fn wrong_kind(id: &ResourceId, expected: ResourceKind, found: &Resource) -> AppError {
    tracing::debug!(
        id = %id,
        expected = %expected,
        found = %found.kind(),
        "Resource has unexpected kind"
    );
    AppError::not_found(expected.as_str(), id)
}

pub async fn find_file_set(
    repository: &dyn ResourceRepository,
    id: &ResourceId,
) -> Result<FileSet, AppError> {
    match repository.find_by(id).await {
        Ok(Resource::FileSet(fs)) => Ok(fs),
        Ok(other) => Err(wrong_kind(id, ResourceKind::FileSet, &other)),
        Err(e) if e.is_not_found() => Err(AppError::not_found("FileSet", id)),
        Err(e) => Err(e),
    }
}

pub async fn find_file_metadata(
    repository: &dyn ResourceRepository,
    id: &ResourceId,
) -> Result<FileMetadata, AppError> {
    match repository.find_by(id).await {
        Ok(Resource::FileMetadata(fm)) => Ok(fm),
        Ok(other) => Err(wrong_kind(id, ResourceKind::FileMetadata, &other)),
        Err(e) if e.is_not_found() => Err(AppError::not_found("FileMetadata", id)),
        Err(e) => Err(e),
    }
}

pub async fn find_work(
    repository: &dyn ResourceRepository,
    id: &ResourceId,
) -> Result<Work, AppError> {
    match repository.find_by(id).await {
        Ok(Resource::Work(work)) => Ok(work),
        Ok(other) => Err(wrong_kind(id, ResourceKind::Work, &other)),
        Err(e) if e.is_not_found() => Err(AppError::not_found("Work", id)),
        Err(e) => Err(e),
    }
}

/// All FileMetadata attached to `file_set`, in `file_ids` order. Dangling ids
/// are skipped with a warning.
pub async fn find_files(
    repository: &dyn ResourceRepository,
    file_set: &FileSet,
) -> Result<Vec<FileMetadata>, AppError> {
    let mut files = Vec::with_capacity(file_set.file_ids.len());
    for id in &file_set.file_ids {
        match find_file_metadata(repository, id).await {
            Ok(fm) => files.push(fm),
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    file_set_id = %file_set.id,
                    file_id = %id,
                    "FileSet references a missing file"
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(files)
}

pub async fn find_file_metadata_by_use(
    repository: &dyn ResourceRepository,
    file_set: &FileSet,
    use_tag: Use,
) -> Result<Option<FileMetadata>, AppError> {
    let Some(id) = file_set.file_id_for(use_tag) else {
        return Ok(None);
    };
    match find_file_metadata(repository, id).await {
        Ok(fm) => Ok(Some(fm)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn find_original_file(
    repository: &dyn ResourceRepository,
    file_set: &FileSet,
) -> Result<Option<FileMetadata>, AppError> {
    find_file_metadata_by_use(repository, file_set, Use::OriginalFile).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::resources::{ChangeSet, InMemoryResourceRepository};

    async fn file_set_with_original(
        repo: &InMemoryResourceRepository,
    ) -> (FileSet, FileMetadata) {
        let mut fs = FileSet::new();
        let fm = FileMetadata::new(fs.id.clone(), "image.png", "image/png", 3, Use::OriginalFile);
        fs.attach(&fm);
        let saved = repo
            .commit(ChangeSet::new().save(fs).save(fm))
            .await
            .unwrap();
        (
            saved[0].clone().into_file_set().unwrap(),
            saved[1].clone().into_file_metadata().unwrap(),
        )
    }

    #[tokio::test]
    async fn original_file_is_found_through_use_index() {
        let repo = InMemoryResourceRepository::new();
        let (fs, fm) = file_set_with_original(&repo).await;

        let original = find_original_file(&repo, &fs).await.unwrap().unwrap();
        assert_eq!(original.id, fm.id);
        assert!(find_file_metadata_by_use(&repo, &fs, Use::Thumbnail)
            .await
            .unwrap()
            .is_none());
        assert_eq!(find_files(&repo, &fs).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_kind_is_not_found() {
        let repo = InMemoryResourceRepository::new();
        let (_, fm) = file_set_with_original(&repo).await;

        let err = find_file_set(&repo, &fm.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), format!("FileSet not found: {}", fm.id));
    }
}
