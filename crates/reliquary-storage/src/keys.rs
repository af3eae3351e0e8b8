//! Shared key generation for storage backends.
//!
//! Key formats:
//! - `uploads/{upload_id}/{filename}` for staged uploads
//! - `files/{file_set_id}/{file_metadata_id}/{filename}` for ingested files
//! - `derivatives/ab/cd/ef/gh/{file_metadata_id}-{name}.{ext}` for derivatives

use reliquary_core::models::ResourceId;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

const PAIRTREE_DEPTH: usize = 4;

/// Key a payload is staged under before ingest.
pub fn upload_key(upload_id: Uuid, filename: &str) -> String {
    format!("uploads/{}/{}", upload_id, sanitize_filename(filename))
}

/// Key an ingested file's bytes are stored under.
pub fn file_key(file_set_id: &ResourceId, file_metadata_id: &ResourceId, filename: &str) -> String {
    format!(
        "files/{}/{}/{}",
        path_segment(file_set_id.as_str()),
        path_segment(file_metadata_id.as_str()),
        sanitize_filename(filename)
    )
}

/// Pair-tree key for a derivative of the file `file_metadata_id`.
///
/// The first eight alphanumeric characters of the id are split into
/// two-character directories so no single directory grows unbounded.
pub fn derivative_key(file_metadata_id: &ResourceId, name: &str, extension: &str) -> String {
    let id = path_segment(file_metadata_id.as_str());
    let compact: Vec<char> = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PAIRTREE_DEPTH * 2)
        .collect();
    let pairs: Vec<String> = compact
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect();

    let mut key = String::from("derivatives/");
    for pair in pairs {
        key.push_str(&pair);
        key.push('/');
    }
    key.push_str(&format!(
        "{}-{}.{}",
        id,
        sanitize_filename(name),
        extension.trim_start_matches('.')
    ));
    key
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Strip directory components and traversal sequences from a client filename.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned = base.replace("..", "_");
    if cleaned.is_empty() || cleaned == "." {
        "file".to_string()
    } else {
        cleaned
    }
}

fn path_segment(id: &str) -> String {
    id.chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect()
}
