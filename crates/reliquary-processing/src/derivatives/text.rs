use crate::traits::{DerivativeGenerator, Rendition};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reliquary_core::constants::EXTRACTED_TEXT_DERIVATIVE_NAME;
use reliquary_core::models::Use;

/// Full text of a text source with line endings normalized to `\n` and any
/// byte order mark dropped.
pub struct ExtractedTextGenerator;

impl ExtractedTextGenerator {
    pub fn extract(data: &[u8]) -> Result<String, anyhow::Error> {
        let text = std::str::from_utf8(data).context("Source is not valid UTF-8 text")?;
        Ok(text.trim_start_matches('\u{feff}').replace("\r\n", "\n"))
    }
}

#[async_trait]
impl DerivativeGenerator for ExtractedTextGenerator {
    fn name(&self) -> &'static str {
        "extracted_text"
    }

    fn produces(&self) -> Vec<Use> {
        vec![Use::ExtractedText]
    }

    async fn generate(
        &self,
        data: &[u8],
        _mime_type: &str,
    ) -> Result<Vec<Rendition>, anyhow::Error> {
        let text = Self::extract(data)?;
        Ok(vec![Rendition {
            use_tag: Use::ExtractedText,
            name: EXTRACTED_TEXT_DERIVATIVE_NAME.to_string(),
            mime_type: "text/plain".to_string(),
            extension: "txt".to_string(),
            bytes: Bytes::from(text),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn normalizes_line_endings() {
        let renditions = ExtractedTextGenerator
            .generate("\u{feff}a\r\nb\r\n".as_bytes(), "text/plain")
            .await
            .unwrap();

        assert_eq!(renditions.len(), 1);
        assert_eq!(renditions[0].use_tag, Use::ExtractedText);
        assert_eq!(renditions[0].bytes, Bytes::from_static(b"a\nb\n"));
        assert_eq!(renditions[0].filename_for("notes.txt"), "notes-extracted_text.txt");
    }
}
