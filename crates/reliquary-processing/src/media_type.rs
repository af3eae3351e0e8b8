//! Media type detection
//!
//! The declared content type wins when it is specific. Otherwise the leading
//! bytes are checked against known signatures, and the file extension is the
//! last resort.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Text,
    Other,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Text => "text",
            MediaType::Other => "other",
        }
    }

    pub fn detect(content_type: Option<&str>, data: &[u8], filename: &str) -> MediaType {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| Self::from_magic_bytes(data))
            .or_else(|| Self::from_extension(filename))
            .unwrap_or(MediaType::Other)
    }

    /// `None` for missing or generic content types.
    pub fn from_content_type(content_type: &str) -> Option<MediaType> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "" | "application/octet-stream" | "binary/octet-stream" => None,
            // Vector images are not raster-decodable
            "image/svg+xml" => Some(MediaType::Text),
            "application/json" | "application/xml" | "application/x-yaml" => {
                Some(MediaType::Text)
            }
            ct if ct.starts_with("image/") => Some(MediaType::Image),
            ct if ct.starts_with("text/") => Some(MediaType::Text),
            _ => Some(MediaType::Other),
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<MediaType> {
        const SIGNATURES: &[&[u8]] = &[
            b"\x89PNG\r\n\x1a\n",
            b"\xFF\xD8\xFF",
            b"GIF87a",
            b"GIF89a",
            b"BM",
            b"II*\0",
            b"MM\0*",
        ];

        if SIGNATURES.iter().any(|sig| data.starts_with(sig)) {
            return Some(MediaType::Image);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(MediaType::Image);
        }
        None
    }

    pub fn from_extension(filename: &str) -> Option<MediaType> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())?;

        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" => {
                Some(MediaType::Image)
            }
            "txt" | "text" | "md" | "csv" | "tsv" | "json" | "xml" | "html" | "htm" => {
                Some(MediaType::Text)
            }
            _ => None,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn declared_content_type_wins() {
        assert_eq!(
            MediaType::detect(Some("text/plain; charset=utf-8"), PNG_HEADER, "a.png"),
            MediaType::Text
        );
        assert_eq!(
            MediaType::detect(Some("image/jpeg"), b"", "a.bin"),
            MediaType::Image
        );
    }

    #[test]
    fn generic_content_type_falls_back_to_magic_bytes() {
        assert_eq!(
            MediaType::detect(Some("application/octet-stream"), PNG_HEADER, "upload"),
            MediaType::Image
        );
        assert_eq!(MediaType::detect(None, PNG_HEADER, "notes.txt"), MediaType::Image);
    }

    #[test]
    fn extension_is_the_last_resort() {
        assert_eq!(MediaType::detect(None, b"hello", "notes.TXT"), MediaType::Text);
        assert_eq!(MediaType::detect(None, b"hello", "photo.jpeg"), MediaType::Image);
        assert_eq!(MediaType::detect(None, b"\0\x01", "blob"), MediaType::Other);
    }

    #[test]
    fn specific_unknown_content_types_are_other() {
        assert_eq!(
            MediaType::detect(Some("application/pdf"), PNG_HEADER, "a.png"),
            MediaType::Other
        );
    }
}
