//! Image characterizer - dimensions and format via the `image` crate

use crate::characterizer::checksum_sha256;
use crate::traits::Characterizer;
use anyhow::Context;
use async_trait::async_trait;
use image::{GenericImageView, ImageReader};
use reliquary_core::models::Characterization;
use serde_json::json;
use std::io::Cursor;

pub struct ImageCharacterizer;

struct ImageInfo {
    format_label: String,
    mime_type: String,
    width: u32,
    height: u32,
    color_type: String,
}

impl ImageCharacterizer {
    fn read_image(data: &[u8]) -> Result<ImageInfo, anyhow::Error> {
        let cursor = Cursor::new(data);
        let reader = ImageReader::new(cursor).with_guessed_format()?;
        let format = reader.format();
        let img = reader.decode()?;
        let (width, height) = img.dimensions();

        Ok(ImageInfo {
            format_label: format
                .map(|f| format!("{:?}", f))
                .unwrap_or_else(|| "unknown".to_string()),
            mime_type: format
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_default(),
            width,
            height,
            color_type: format!("{:?}", img.color()),
        })
    }
}

#[async_trait]
impl Characterizer for ImageCharacterizer {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn characterize(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> Result<Characterization, anyhow::Error> {
        let owned = data.to_vec();
        let info = tokio::task::spawn_blocking(move || Self::read_image(&owned))
            .await
            .context("Image decoding task failed")??;

        Ok(Characterization {
            characterizer: self.name().to_string(),
            format_label: info.format_label,
            mime_type: info.mime_type,
            size_bytes: data.len() as u64,
            checksum_sha256: checksum_sha256(data),
            width: Some(info.width),
            height: Some(info.height),
            line_count: None,
            extra: json!({ "color_type": info.color_type }),
        })
    }
}
