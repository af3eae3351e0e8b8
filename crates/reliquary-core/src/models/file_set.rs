use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{FileMetadata, ResourceId, Use};

/// Attachment point on a work holding files distinguished by use.
///
/// `file_ids` and `files_by_use` always describe the same set of ids: every
/// mutation goes through [`FileSet::attach`] / [`FileSet::detach`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSet {
    pub id: ResourceId,
    pub title: Vec<String>,
    pub label: Option<String>,
    pub depositor: Option<String>,
    pub file_ids: Vec<ResourceId>,
    pub files_by_use: BTreeMap<Use, ResourceId>,
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::with_id(ResourceId::generate())
    }

    pub fn with_id(id: ResourceId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: Vec::new(),
            label: None,
            depositor: None,
            file_ids: Vec::new(),
            files_by_use: BTreeMap::new(),
            lock_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn file_id_for(&self, use_tag: Use) -> Option<&ResourceId> {
        self.files_by_use.get(&use_tag)
    }

    pub fn original_file_id(&self) -> Option<&ResourceId> {
        self.file_id_for(Use::OriginalFile)
    }

    pub fn thumbnail_id(&self) -> Option<&ResourceId> {
        self.file_id_for(Use::Thumbnail)
    }

    pub fn extracted_text_id(&self) -> Option<&ResourceId> {
        self.file_id_for(Use::ExtractedText)
    }

    /// Attach `metadata` under its use tag, replacing any previous file with
    /// the same use. Returns the id of the replaced file.
    pub fn attach(&mut self, metadata: &FileMetadata) -> Option<ResourceId> {
        let replaced = self
            .files_by_use
            .insert(metadata.use_tag, metadata.id.clone());
        if let Some(old) = &replaced {
            self.file_ids.retain(|id| id != old);
        }
        if !self.file_ids.contains(&metadata.id) {
            self.file_ids.push(metadata.id.clone());
        }
        replaced.filter(|old| old != &metadata.id)
    }

    /// Remove the file with `use_tag`, returning its id.
    pub fn detach(&mut self, use_tag: Use) -> Option<ResourceId> {
        let removed = self.files_by_use.remove(&use_tag)?;
        self.file_ids.retain(|id| id != &removed);
        Some(removed)
    }

    pub fn has_title(&self) -> bool {
        self.title.iter().any(|t| !t.trim().is_empty())
    }

    /// Derive title and label from an uploaded filename where they are unset.
    /// Returns true when anything changed.
    pub fn apply_default_title(&mut self, filename: &str) -> bool {
        let mut changed = false;
        if !self.has_title() {
            self.title = vec![filename.to_string()];
            changed = true;
        }
        if self.label.as_deref().map_or(true, |l| l.trim().is_empty()) {
            self.label = Some(filename.to_string());
            changed = true;
        }
        changed
    }

    /// `file_ids` has no duplicates and matches the use index exactly.
    pub fn is_consistent(&self) -> bool {
        let ids: HashSet<&ResourceId> = self.file_ids.iter().collect();
        let indexed: HashSet<&ResourceId> = self.files_by_use.values().collect();
        ids.len() == self.file_ids.len() && ids == indexed
    }
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(file_set: &FileSet, name: &str, use_tag: Use) -> FileMetadata {
        FileMetadata::new(file_set.id.clone(), name, "image/png", 1, use_tag)
    }

    #[test]
    fn attaching_a_new_use_grows_file_ids_by_one() {
        let mut fs = FileSet::new();
        let original = metadata(&fs, "image.png", Use::OriginalFile);
        assert!(fs.attach(&original).is_none());

        let thumb = metadata(&fs, "world.png", Use::Thumbnail);
        assert!(fs.attach(&thumb).is_none());

        assert_eq!(fs.file_ids.len(), 2);
        assert_eq!(fs.original_file_id(), Some(&original.id));
        assert_eq!(fs.thumbnail_id(), Some(&thumb.id));
        assert!(fs.is_consistent());
    }

    #[test]
    fn attaching_an_existing_use_replaces() {
        let mut fs = FileSet::new();
        let first = metadata(&fs, "a.png", Use::OriginalFile);
        let second = metadata(&fs, "b.png", Use::OriginalFile);
        fs.attach(&first);

        let replaced = fs.attach(&second);

        assert_eq!(replaced, Some(first.id.clone()));
        assert_eq!(fs.file_ids, vec![second.id.clone()]);
        assert!(!fs.file_ids.contains(&first.id));
        assert!(fs.is_consistent());
    }

    #[test]
    fn reattaching_same_file_is_a_no_op() {
        let mut fs = FileSet::new();
        let original = metadata(&fs, "a.png", Use::OriginalFile);
        fs.attach(&original);
        assert!(fs.attach(&original).is_none());
        assert_eq!(fs.file_ids.len(), 1);
    }

    #[test]
    fn detach_keeps_index_consistent() {
        let mut fs = FileSet::new();
        let original = metadata(&fs, "a.png", Use::OriginalFile);
        fs.attach(&original);
        assert_eq!(fs.detach(Use::OriginalFile), Some(original.id));
        assert!(fs.detach(Use::OriginalFile).is_none());
        assert!(fs.file_ids.is_empty());
        assert!(fs.is_consistent());
    }

    #[test]
    fn default_title_only_fills_blanks() {
        let mut fs = FileSet::new();
        assert!(fs.apply_default_title("image.png"));
        assert_eq!(fs.title, vec!["image.png".to_string()]);
        assert_eq!(fs.label.as_deref(), Some("image.png"));

        assert!(!fs.apply_default_title("other.png"));
        assert_eq!(fs.title, vec!["image.png".to_string()]);
    }
}
