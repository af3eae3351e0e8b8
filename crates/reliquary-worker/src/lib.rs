//! Reliquary Worker – background job queue and worker infrastructure.
//!
//! This crate provides the job queue (polling, retry, worker pool) and the
//! `JobHandlerContext` trait. The ingest crate implements the trait for its
//! application state and dispatches to its job handlers.

mod context;
mod queue;

pub use context::{empty_context_weak, JobHandlerContext};
pub use queue::{JobFinishedSender, JobQueue, JobQueueConfig, MAX_RETRY_BACKOFF_SECS};
