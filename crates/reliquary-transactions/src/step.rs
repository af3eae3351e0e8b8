use async_trait::async_trait;
use reliquary_core::models::User;
use serde_json::{Map, Value};

/// Per-call options handed to every step of a transaction.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    /// The user the transaction runs on behalf of.
    pub user: Option<User>,
    pub extra: Map<String, Value>,
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// One unit of work in a transaction. Receives the previous step's output and
/// returns the input for the next one.
#[async_trait]
pub trait Step<T: Send>: Send + Sync {
    async fn call(&self, input: T, options: &StepOptions) -> anyhow::Result<T>;
}
