//! Repositories for the data access layer
//!
//! Resources (works, file sets, file metadata, access controls) live behind the
//! [`ResourceRepository`] gateway. Jobs have their own store so the worker can
//! claim them without touching resource locks.
//
// Persistence gateway
pub mod resources;
//
// Typed lookups over the gateway
pub mod queries;
//
// Job store used by the worker queue
pub mod jobs;
//
// Search index and the FileSet indexer
pub mod search;

pub use jobs::{JobRepository, JobStats};
pub use resources::{ChangeSet, InMemoryResourceRepository, ResourceRepository};
pub use search::{FileSetIndexer, InMemorySearchIndex, IndexDocument, SearchIndex};
