//! Thumbnail generator - shrink to fit a bounding box, encode as JPEG

use crate::traits::{DerivativeGenerator, Rendition};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use reliquary_core::constants::THUMBNAIL_DERIVATIVE_NAME;
use reliquary_core::models::Use;
use std::io::Cursor;

pub struct ThumbnailGenerator {
    max_width: u32,
    max_height: u32,
}

impl ThumbnailGenerator {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Images already inside the box keep their size.
    pub fn render(data: &[u8], max_width: u32, max_height: u32) -> Result<Bytes, anyhow::Error> {
        let cursor = Cursor::new(data);
        let img = ImageReader::new(cursor).with_guessed_format()?.decode()?;

        let (width, height) = img.dimensions();
        let img = if width > max_width || height > max_height {
            img.thumbnail(max_width, max_height)
        } else {
            img
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let (width, height) = rgb.dimensions();
        let mut buffer = Vec::with_capacity(rgb_buffer_len(width, height));
        rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;

        Ok(Bytes::from(buffer))
    }
}

/// Bytes in an RGB8 buffer of the given size, computed in `usize`.
fn rgb_buffer_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(3)
}

#[async_trait]
impl DerivativeGenerator for ThumbnailGenerator {
    fn name(&self) -> &'static str {
        "thumbnail"
    }

    fn produces(&self) -> Vec<Use> {
        vec![Use::Thumbnail]
    }

    async fn generate(
        &self,
        data: &[u8],
        _mime_type: &str,
    ) -> Result<Vec<Rendition>, anyhow::Error> {
        let owned = data.to_vec();
        let (max_width, max_height) = (self.max_width, self.max_height);
        let bytes = tokio::task::spawn_blocking(move || Self::render(&owned, max_width, max_height))
            .await
            .context("Thumbnail task failed")??;

        Ok(vec![Rendition {
            use_tag: Use::Thumbnail,
            name: THUMBNAIL_DERIVATIVE_NAME.to_string(),
            mime_type: "image/jpeg".to_string(),
            extension: "jpeg".to_string(),
            bytes,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn dimensions_of(data: &[u8]) -> (u32, u32) {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
            .dimensions()
    }

    #[tokio::test]
    async fn shrinks_to_fit_and_keeps_aspect_ratio() {
        let renditions = ThumbnailGenerator::new(200, 150)
            .generate(&create_test_image(400, 200), "image/png")
            .await
            .unwrap();

        let thumb = &renditions[0];
        assert_eq!(thumb.use_tag, Use::Thumbnail);
        assert_eq!(thumb.mime_type, "image/jpeg");
        assert_eq!(dimensions_of(&thumb.bytes), (200, 100));
    }

    #[tokio::test]
    async fn small_images_are_not_enlarged() {
        let renditions = ThumbnailGenerator::new(200, 150)
            .generate(&create_test_image(50, 20), "image/png")
            .await
            .unwrap();
        assert_eq!(dimensions_of(&renditions[0].bytes), (50, 20));
    }

    #[test]
    fn buffer_len_does_not_wrap_for_large_images() {
        assert_eq!(rgb_buffer_len(300, 200), 180_000);
        assert_eq!(rgb_buffer_len(0, 5000), 0);
        assert_eq!(rgb_buffer_len(70_000, 70_000) as u64, 14_700_000_000);
    }

    #[tokio::test]
    async fn garbage_is_an_error() {
        assert!(ThumbnailGenerator::new(200, 150)
            .generate(b"not an image", "image/png")
            .await
            .is_err());
    }
}
