use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Discover,
    Read,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub mode: AccessMode,
    /// User key or group name.
    pub agent: String,
}

/// Access-control list attached to another resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessControl {
    pub id: ResourceId,
    pub access_to: ResourceId,
    pub permissions: Vec<Permission>,
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessControl {
    pub fn new(access_to: ResourceId) -> Self {
        let now = Utc::now();
        Self {
            id: ResourceId::generate(),
            access_to,
            permissions: Vec::new(),
            lock_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn grant(mut self, mode: AccessMode, agent: impl Into<String>) -> Self {
        let permission = Permission {
            mode,
            agent: agent.into(),
        };
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }
}
