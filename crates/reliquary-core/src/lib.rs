//! Reliquary Core Library
//!
//! This crate provides the domain models, lifecycle events, error types and
//! configuration shared by every Reliquary component: the persistence gateway,
//! storage backends, the job queue and the ingest/derivative jobs.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod hooks;
pub mod models;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel};
pub use events::{Event, EventName, EventPayload};
pub use hooks::JobEnqueuer;
pub use storage_types::StorageBackend;
pub use task_error::TaskError;
