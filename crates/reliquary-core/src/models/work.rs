use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceId;

/// A deposited work. Only the fields the destroy transaction needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: ResourceId,
    pub title: Vec<String>,
    pub depositor: Option<String>,
    pub member_ids: Vec<ResourceId>,
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Work {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ResourceId::generate(),
            title: vec![title.into()],
            depositor: None,
            member_ids: Vec::new(),
            lock_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_member(&mut self, member: ResourceId) {
        if !self.member_ids.contains(&member) {
            self.member_ids.push(member);
        }
    }
}
