//! Reliquary Storage Library
//!
//! Blob storage for uploaded payloads and generated derivatives. The
//! [`Storage`] trait is implemented by a local-filesystem backend and an
//! in-memory backend used by tests and single-process runs.
//!
//! # Storage key format
//!
//! All backends share one key layout, generated in the [`keys`] module:
//!
//! - **Staged uploads**: `uploads/{upload_id}/{filename}`
//! - **Ingested files**: `files/{file_set_id}/{file_metadata_id}/{filename}`
//! - **Derivatives**: `derivatives/ab/cd/ef/gh/{file_metadata_id}-{name}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use reliquary_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
