//! Reliquary ingest pipeline
//!
//! Wires the persistence gateway, blob storage, characterizers, derivative
//! generators, event bus and job queue into one [`AppState`], and provides the
//! two jobs the queue runs against it:
//!
//! - [`IngestJob`] attaches a staged upload to its FileSet and schedules
//!   derivatives.
//! - [`CreateDerivativesJob`] renders thumbnails and extracted text from the
//!   original file.

pub mod setup;
pub mod staging;
pub mod state;
pub mod task_dispatch;
pub mod task_handlers;

pub use setup::services::{
    build_state_without_worker, initialize_services, start_services, ServiceParts, Services,
};
pub use staging::{stage_upload, submit_ingest};
pub use state::AppState;
pub use task_handlers::derivatives::{CreateDerivativesJob, DerivativeOutcome};
pub use task_handlers::ingest::{IngestJob, IngestOutcome};
pub use task_handlers::JobHandler;
