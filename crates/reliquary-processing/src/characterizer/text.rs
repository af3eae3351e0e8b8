use crate::characterizer::checksum_sha256;
use crate::traits::Characterizer;
use anyhow::Context;
use async_trait::async_trait;
use reliquary_core::models::Characterization;
use serde_json::json;

/// Validates UTF-8 and counts lines.
pub struct TextCharacterizer;

#[async_trait]
impl Characterizer for TextCharacterizer {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn characterize(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> Result<Characterization, anyhow::Error> {
        let text = std::str::from_utf8(data).context("File is not valid UTF-8 text")?;

        Ok(Characterization {
            characterizer: self.name().to_string(),
            format_label: "Plain Text".to_string(),
            size_bytes: data.len() as u64,
            checksum_sha256: checksum_sha256(data),
            line_count: Some(text.lines().count() as u64),
            extra: json!({ "encoding": "UTF-8", "char_count": text.chars().count() }),
            ..Default::default()
        })
    }
}
