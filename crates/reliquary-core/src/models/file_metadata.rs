use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::ResourceId;
use crate::error::AppError;

/// Role of a file within a FileSet.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Use {
    #[default]
    OriginalFile,
    Thumbnail,
    ExtractedText,
    ServiceFile,
    PreservationFile,
}

impl Use {
    pub const ALL: [Use; 5] = [
        Use::OriginalFile,
        Use::Thumbnail,
        Use::ExtractedText,
        Use::ServiceFile,
        Use::PreservationFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Use::OriginalFile => "original_file",
            Use::Thumbnail => "thumbnail",
            Use::ExtractedText => "extracted_text",
            Use::ServiceFile => "service_file",
            Use::PreservationFile => "preservation_file",
        }
    }

    /// Whether files with this use are produced by the derivative job rather
    /// than uploaded.
    pub fn is_derivative(&self) -> bool {
        matches!(self, Use::Thumbnail | Use::ExtractedText | Use::ServiceFile)
    }
}

impl Display for Use {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Use {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Use::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown file use: {}", s)))
    }
}

/// Technical attributes extracted from file bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characterization {
    /// Name of the strategy that produced this document.
    pub characterizer: String,
    pub format_label: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub line_count: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CharacterizationStatus {
    #[default]
    Pending,
    Succeeded,
    Failed {
        reason: String,
    },
}

impl CharacterizationStatus {
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            CharacterizationStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// One physical or derivative file attached to a FileSet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: ResourceId,
    pub file_set_id: ResourceId,
    pub original_filename: String,
    pub label: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Where the bytes live in blob storage.
    pub storage_key: String,
    pub use_tag: Use,
    pub characterization: Option<Characterization>,
    pub characterization_status: CharacterizationStatus,
    /// Source file this one was generated from (derivatives only).
    pub derived_from: Option<ResourceId>,
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileMetadata {
    pub fn new(
        file_set_id: ResourceId,
        original_filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        use_tag: Use,
    ) -> Self {
        let original_filename = original_filename.into();
        let now = Utc::now();
        Self {
            id: ResourceId::generate(),
            file_set_id,
            label: original_filename.clone(),
            original_filename,
            mime_type: mime_type.into(),
            size_bytes,
            storage_key: String::new(),
            use_tag,
            characterization: None,
            characterization_status: CharacterizationStatus::Pending,
            derived_from: None,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_original_file(&self) -> bool {
        self.use_tag == Use::OriginalFile
    }

    /// Whether this file was generated from another one rather than uploaded.
    pub fn is_derivative(&self) -> bool {
        self.derived_from.is_some()
    }

    pub fn is_derived_from(&self, source_id: &ResourceId) -> bool {
        self.derived_from.as_ref() == Some(source_id)
    }

    pub fn record_characterization(&mut self, characterization: Characterization) {
        if !characterization.mime_type.is_empty() {
            self.mime_type = characterization.mime_type.clone();
        }
        self.characterization = Some(characterization);
        self.characterization_status = CharacterizationStatus::Succeeded;
    }

    pub fn record_characterization_failure(&mut self, reason: impl Into<String>) {
        self.characterization = None;
        self.characterization_status = CharacterizationStatus::Failed {
            reason: reason.into(),
        };
    }

    pub fn characterization_failed(&self) -> bool {
        matches!(
            self.characterization_status,
            CharacterizationStatus::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_round_trips_through_strings() {
        for use_tag in Use::ALL {
            assert_eq!(use_tag.as_str().parse::<Use>().unwrap(), use_tag);
        }
        assert!("pcdm:Nope".parse::<Use>().is_err());
    }

    #[test]
    fn new_metadata_defaults_label_to_filename() {
        let fm = FileMetadata::new(
            ResourceId::new("fs"),
            "image.png",
            "image/png",
            10,
            Use::OriginalFile,
        );
        assert_eq!(fm.label, "image.png");
        assert!(fm.is_original_file());
        assert_eq!(fm.characterization_status, CharacterizationStatus::Pending);
    }

    #[test]
    fn derivative_tracks_its_source() {
        let source = FileMetadata::new(
            ResourceId::new("fs"),
            "image.png",
            "image/png",
            10,
            Use::OriginalFile,
        );
        let mut thumbnail = FileMetadata::new(
            ResourceId::new("fs"),
            "image-thumbnail.jpeg",
            "image/jpeg",
            4,
            Use::Thumbnail,
        );
        assert!(Use::Thumbnail.is_derivative());
        assert!(!Use::OriginalFile.is_derivative());
        assert!(!thumbnail.is_derivative());

        thumbnail.derived_from = Some(source.id.clone());
        assert!(thumbnail.is_derivative());
        assert!(thumbnail.is_derived_from(&source.id));
        assert!(!thumbnail.is_derived_from(&ResourceId::new("other")));
    }

    #[test]
    fn characterization_outcomes_are_flagged() {
        let mut fm = FileMetadata::new(
            ResourceId::new("fs"),
            "blob.bin",
            "application/octet-stream",
            3,
            Use::OriginalFile,
        );
        fm.record_characterization_failure("unreadable");
        assert!(fm.characterization_failed());

        fm.record_characterization(Characterization {
            characterizer: "image".to_string(),
            mime_type: "image/png".to_string(),
            ..Default::default()
        });
        assert!(!fm.characterization_failed());
        assert_eq!(fm.mime_type, "image/png");
    }
}
