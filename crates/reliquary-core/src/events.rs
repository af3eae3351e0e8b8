//! Lifecycle events
//!
//! Every event carries a fixed payload shape per name. Events are built after
//! the state change they describe has been committed and are never used to
//! signal back to the producer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::models::{FileMetadata, FileSet, ResourceId, Use, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "object.file.uploaded")]
    FileUploaded,
    #[serde(rename = "object.membership.updated")]
    MembershipUpdated,
    #[serde(rename = "file.metadata.updated")]
    MetadataUpdated,
    #[serde(rename = "file.characterization.failed")]
    CharacterizationFailed,
    #[serde(rename = "file.derivatives.created")]
    DerivativesCreated,
    #[serde(rename = "file.derivatives.failed")]
    DerivativesFailed,
    #[serde(rename = "object.deleted")]
    ObjectDeleted,
    #[serde(rename = "object.acl.deleted")]
    AclDeleted,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::FileUploaded => "object.file.uploaded",
            EventName::MembershipUpdated => "object.membership.updated",
            EventName::MetadataUpdated => "file.metadata.updated",
            EventName::CharacterizationFailed => "file.characterization.failed",
            EventName::DerivativesCreated => "file.derivatives.created",
            EventName::DerivativesFailed => "file.derivatives.failed",
            EventName::ObjectDeleted => "object.deleted",
            EventName::AclDeleted => "object.acl.deleted",
        }
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Reference to one rendition created by the derivative job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeRef {
    pub id: ResourceId,
    pub use_tag: Use,
    pub storage_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    FileUploaded {
        metadata: FileMetadata,
        user: User,
    },
    MembershipUpdated {
        object: FileSet,
        user: User,
    },
    MetadataUpdated {
        metadata: FileMetadata,
    },
    CharacterizationFailed {
        metadata: FileMetadata,
        reason: String,
    },
    DerivativesCreated {
        file_set_id: ResourceId,
        source_id: ResourceId,
        derivatives: Vec<DerivativeRef>,
    },
    DerivativesFailed {
        file_set_id: ResourceId,
        source_id: Option<ResourceId>,
        reason: String,
    },
    ObjectDeleted {
        id: ResourceId,
        user: Option<User>,
    },
    AclDeleted {
        id: ResourceId,
        access_to: ResourceId,
    },
}

impl EventPayload {
    /// The only name this payload may be published under.
    pub fn name(&self) -> EventName {
        match self {
            EventPayload::FileUploaded { .. } => EventName::FileUploaded,
            EventPayload::MembershipUpdated { .. } => EventName::MembershipUpdated,
            EventPayload::MetadataUpdated { .. } => EventName::MetadataUpdated,
            EventPayload::CharacterizationFailed { .. } => EventName::CharacterizationFailed,
            EventPayload::DerivativesCreated { .. } => EventName::DerivativesCreated,
            EventPayload::DerivativesFailed { .. } => EventName::DerivativesFailed,
            EventPayload::ObjectDeleted { .. } => EventName::ObjectDeleted,
            EventPayload::AclDeleted { .. } => EventName::AclDeleted,
        }
    }
}

/// An immutable, published event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub name: EventName,
    pub payload: EventPayload,
    pub published_at: DateTime<Utc>,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: payload.name(),
            payload,
            published_at: Utc::now(),
        }
    }

    /// The FileMetadata carried by file-level events.
    pub fn metadata(&self) -> Option<&FileMetadata> {
        match &self.payload {
            EventPayload::FileUploaded { metadata, .. }
            | EventPayload::MetadataUpdated { metadata }
            | EventPayload::CharacterizationFailed { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match &self.payload {
            EventPayload::FileUploaded { user, .. }
            | EventPayload::MembershipUpdated { user, .. } => Some(user),
            EventPayload::ObjectDeleted { user, .. } => user.as_ref(),
            _ => None,
        }
    }
}
