//! Characterization strategies
//!
//! [`CharacterizerRegistry`] picks one [`Characterizer`] per detected
//! [`MediaType`] and falls back to [`DefaultCharacterizer`] (checksum and size
//! only) for anything it does not recognize.

mod checksum;
#[cfg(feature = "image")]
mod image;
mod text;

pub use checksum::{checksum_sha256, DefaultCharacterizer};
#[cfg(feature = "image")]
pub use image::ImageCharacterizer;
pub use text::TextCharacterizer;

use crate::media_type::MediaType;
use crate::traits::Characterizer;
use reliquary_core::constants::DEFAULT_CONTENT_TYPE;
use reliquary_core::models::Characterization;
use reliquary_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CharacterizerRegistry {
    strategies: HashMap<MediaType, Arc<dyn Characterizer>>,
    fallback: Arc<dyn Characterizer>,
}

impl CharacterizerRegistry {
    /// Registry with no strategies: everything goes to `fallback`.
    pub fn new(fallback: Arc<dyn Characterizer>) -> Self {
        Self {
            strategies: HashMap::new(),
            fallback,
        }
    }

    /// Image and text strategies over the checksum-only default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(Arc::new(DefaultCharacterizer));
        #[cfg(feature = "image")]
        registry.register(MediaType::Image, Arc::new(ImageCharacterizer));
        registry.register(MediaType::Text, Arc::new(TextCharacterizer));
        registry
    }

    /// Returns the strategy previously registered for `media_type`, if any.
    pub fn register(
        &mut self,
        media_type: MediaType,
        characterizer: Arc<dyn Characterizer>,
    ) -> Option<Arc<dyn Characterizer>> {
        self.strategies.insert(media_type, characterizer)
    }

    pub fn characterizer_for(&self, media_type: MediaType) -> Arc<dyn Characterizer> {
        self.strategies
            .get(&media_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn characterize(
        &self,
        data: &[u8],
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<Characterization, AppError> {
        let media_type = MediaType::detect(content_type, data, filename);
        let characterizer = self.characterizer_for(media_type);

        let mut characterization = characterizer
            .characterize(data, filename)
            .await
            .map_err(|e| {
                AppError::Characterization(format!(
                    "{} ({}): {:#}",
                    filename,
                    characterizer.name(),
                    e
                ))
            })?;

        if characterization.mime_type.is_empty() {
            characterization.mime_type = Self::fallback_mime_type(content_type, media_type);
        }

        tracing::debug!(
            media_type = %media_type,
            characterizer = characterizer.name(),
            mime_type = %characterization.mime_type,
            "File characterized"
        );

        Ok(characterization)
    }

    fn fallback_mime_type(content_type: Option<&str>, media_type: MediaType) -> String {
        match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
            Some(ct) if MediaType::from_content_type(ct).is_some() => ct.to_string(),
            _ if media_type == MediaType::Text => "text/plain".to_string(),
            _ => DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl Default for CharacterizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
