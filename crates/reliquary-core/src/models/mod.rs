//! Data models for the ingest pipeline
//!
//! Persisted resources (works, file sets, file metadata, access controls), the
//! transient upload record, and the job records handled by the queue.

mod access_control;
mod file_metadata;
mod file_set;
mod job;
mod resource;
mod uploaded_file;
mod user;
mod work;

pub use access_control::*;
pub use file_metadata::*;
pub use file_set::*;
pub use job::*;
pub use resource::*;
pub use uploaded_file::*;
pub use user::*;
pub use work::*;
