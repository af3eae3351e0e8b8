//! Core traits for media processing
//!
//! Characterizers read technical metadata out of file bytes. Derivative
//! generators turn a source file into renditions that are attached to the same
//! FileSet under a derivative use tag.

use async_trait::async_trait;
use bytes::Bytes;
use reliquary_core::models::{Characterization, Use};

/// Extracts a [`Characterization`] from file bytes.
#[async_trait]
pub trait Characterizer: Send + Sync {
    /// Name recorded in `Characterization::characterizer`.
    fn name(&self) -> &'static str;

    async fn characterize(
        &self,
        data: &[u8],
        filename: &str,
    ) -> Result<Characterization, anyhow::Error>;
}

/// One generated file, ready to be stored and attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub use_tag: Use,
    /// Short name used in the storage key and download route (`thumbnail`).
    pub name: String,
    pub mime_type: String,
    pub extension: String,
    pub bytes: Bytes,
}

impl Rendition {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Filename the rendition is recorded under, derived from the source name.
    pub fn filename_for(&self, source_filename: &str) -> String {
        let stem = std::path::Path::new(source_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("file");
        format!("{}-{}.{}", stem, self.name, self.extension)
    }
}

/// Produces renditions from a source file.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Use tags this generator produces.
    fn produces(&self) -> Vec<Use>;

    async fn generate(&self, data: &[u8], mime_type: &str) -> Result<Vec<Rendition>, anyhow::Error>;
}
