use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user on whose behalf an upload or destroy happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
        }
    }

    /// Key used as depositor and permission agent.
    pub fn user_key(&self) -> &str {
        &self.email
    }
}
