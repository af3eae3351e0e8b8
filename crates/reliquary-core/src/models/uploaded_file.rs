use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ResourceId, User};

/// A staged upload waiting to be ingested.
///
/// The payload bytes already live in blob storage under `storage_key`; the
/// record itself is small enough to travel as a job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: Uuid,
    pub user: User,
    /// FileSet the upload should be attached to.
    pub file_set_uri: Option<ResourceId>,
    pub filename: String,
    pub content_type: String,
    pub storage_key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn new(
        user: User,
        file_set_uri: Option<ResourceId>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        storage_key: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            file_set_uri,
            filename: filename.into(),
            content_type: content_type.into(),
            storage_key: storage_key.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }
}
