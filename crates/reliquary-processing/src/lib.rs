//! Reliquary Media Processing Library
//!
//! Characterization (technical metadata extraction) and derivative generation
//! for ingested files. Both are dispatched on the [`MediaType`] detected from
//! the declared content type, the leading bytes and the filename.

pub mod characterizer;
pub mod derivatives;
pub mod media_type;
pub mod traits;

// Re-export commonly used types
pub use characterizer::{
    checksum_sha256, CharacterizerRegistry, DefaultCharacterizer, TextCharacterizer,
};
pub use derivatives::{DerivativeFailure, DerivativeRegistry, ExtractedTextGenerator};
pub use media_type::MediaType;
pub use traits::{Characterizer, DerivativeGenerator, Rendition};

#[cfg(feature = "image")]
pub use characterizer::ImageCharacterizer;
#[cfg(feature = "image")]
pub use derivatives::ThumbnailGenerator;
