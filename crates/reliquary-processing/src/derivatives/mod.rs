//! Derivative generation
//!
//! Generators are registered per [`MediaType`]. Derivatives are only ever
//! produced from an `original_file`: derivatives of derivatives are not made.

mod text;
#[cfg(feature = "image")]
mod thumbnail;

pub use text::ExtractedTextGenerator;
#[cfg(feature = "image")]
pub use thumbnail::ThumbnailGenerator;

use crate::media_type::MediaType;
use crate::traits::DerivativeGenerator;
use reliquary_core::models::Use;
use reliquary_core::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Why a derivative was not produced. Reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivativeFailure {
    #[error("No derivative generator for {use_tag} {media_type} file ({mime_type})")]
    Unsupported {
        use_tag: Use,
        media_type: MediaType,
        mime_type: String,
    },

    #[error("Generator {generator} failed: {reason}")]
    Generator { generator: String, reason: String },

    #[error("Storing rendition {name} failed: {reason}")]
    Storage { name: String, reason: String },
}

#[derive(Default)]
pub struct DerivativeRegistry {
    generators: HashMap<MediaType, Vec<Arc<dyn DerivativeGenerator>>>,
}

impl DerivativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thumbnails for images (bounded by the configured box) and extracted
    /// text for text files.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "image")]
        registry.register(
            MediaType::Image,
            Arc::new(ThumbnailGenerator::new(
                config.thumbnail_max_width,
                config.thumbnail_max_height,
            )),
        );
        #[cfg(not(feature = "image"))]
        let _ = config;
        registry.register(MediaType::Text, Arc::new(ExtractedTextGenerator));
        registry
    }

    pub fn register(&mut self, media_type: MediaType, generator: Arc<dyn DerivativeGenerator>) {
        self.generators.entry(media_type).or_default().push(generator);
    }

    /// Generators that apply to a source with `source_use` of `media_type`,
    /// in registration order.
    pub fn generators_for(
        &self,
        source_use: Use,
        media_type: MediaType,
    ) -> Vec<Arc<dyn DerivativeGenerator>> {
        if source_use != Use::OriginalFile {
            return Vec::new();
        }
        self.generators
            .get(&media_type)
            .cloned()
            .unwrap_or_default()
    }
}
