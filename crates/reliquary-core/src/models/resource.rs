use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::{AccessControl, FileMetadata, FileSet, Work};

/// Opaque identifier of a persisted resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Work,
    FileSet,
    FileMetadata,
    AccessControl,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Work => "Work",
            ResourceKind::FileSet => "FileSet",
            ResourceKind::FileMetadata => "FileMetadata",
            ResourceKind::AccessControl => "AccessControl",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Any resource the persistence gateway can store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Work(Work),
    FileSet(FileSet),
    FileMetadata(FileMetadata),
    AccessControl(AccessControl),
}

impl Resource {
    pub fn id(&self) -> &ResourceId {
        match self {
            Resource::Work(r) => &r.id,
            Resource::FileSet(r) => &r.id,
            Resource::FileMetadata(r) => &r.id,
            Resource::AccessControl(r) => &r.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Work(_) => ResourceKind::Work,
            Resource::FileSet(_) => ResourceKind::FileSet,
            Resource::FileMetadata(_) => ResourceKind::FileMetadata,
            Resource::AccessControl(_) => ResourceKind::AccessControl,
        }
    }

    pub fn lock_version(&self) -> i64 {
        match self {
            Resource::Work(r) => r.lock_version,
            Resource::FileSet(r) => r.lock_version,
            Resource::FileMetadata(r) => r.lock_version,
            Resource::AccessControl(r) => r.lock_version,
        }
    }

    /// Bump the lock version and modification time after a successful write.
    pub fn mark_saved(&mut self, now: DateTime<Utc>) {
        match self {
            Resource::Work(r) => {
                r.lock_version += 1;
                r.updated_at = now;
            }
            Resource::FileSet(r) => {
                r.lock_version += 1;
                r.updated_at = now;
            }
            Resource::FileMetadata(r) => {
                r.lock_version += 1;
                r.updated_at = now;
            }
            Resource::AccessControl(r) => {
                r.lock_version += 1;
                r.updated_at = now;
            }
        }
    }

    pub fn as_file_set(&self) -> Option<&FileSet> {
        match self {
            Resource::FileSet(fs) => Some(fs),
            _ => None,
        }
    }

    pub fn into_file_set(self) -> Option<FileSet> {
        match self {
            Resource::FileSet(fs) => Some(fs),
            _ => None,
        }
    }

    pub fn into_file_metadata(self) -> Option<FileMetadata> {
        match self {
            Resource::FileMetadata(fm) => Some(fm),
            _ => None,
        }
    }

    pub fn into_work(self) -> Option<Work> {
        match self {
            Resource::Work(w) => Some(w),
            _ => None,
        }
    }

    pub fn into_access_control(self) -> Option<AccessControl> {
        match self {
            Resource::AccessControl(acl) => Some(acl),
            _ => None,
        }
    }
}

impl From<Work> for Resource {
    fn from(value: Work) -> Self {
        Resource::Work(value)
    }
}

impl From<FileSet> for Resource {
    fn from(value: FileSet) -> Self {
        Resource::FileSet(value)
    }
}

impl From<FileMetadata> for Resource {
    fn from(value: FileMetadata) -> Self {
        Resource::FileMetadata(value)
    }
}

impl From<AccessControl> for Resource {
    fn from(value: AccessControl) -> Self {
        Resource::AccessControl(value)
    }
}
