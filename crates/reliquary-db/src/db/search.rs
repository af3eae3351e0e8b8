//! Search index
//!
//! Denormalized documents keyed by resource id. The FileSet indexer writes the
//! fields display lookups need (title, label, file ids, thumbnail path) so they
//! never have to walk the resource graph.

use async_trait::async_trait;
use reliquary_core::constants::{DOWNLOADS_PATH_PREFIX, THUMBNAIL_DERIVATIVE_NAME};
use reliquary_core::models::{FileSet, ResourceId};
use reliquary_core::AppError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDocument {
    pub id: ResourceId,
    pub fields: Map<String, Value>,
}

impl IndexDocument {
    pub fn new(id: ResourceId) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(id.as_str()));
        Self { id, fields }
    }

    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for `document.id`.
    async fn save(&self, document: IndexDocument) -> Result<(), AppError>;

    async fn find(&self, id: &ResourceId) -> Result<Option<IndexDocument>, AppError>;

    async fn delete(&self, id: &ResourceId) -> Result<(), AppError>;
}

#[derive(Clone, Default)]
pub struct InMemorySearchIndex {
    documents: Arc<RwLock<HashMap<ResourceId, IndexDocument>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn save(&self, document: IndexDocument) -> Result<(), AppError> {
        tracing::debug!(id = %document.id, fields = document.fields.len(), "Indexing document");
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
        Ok(())
    }

    async fn find(&self, id: &ResourceId) -> Result<Option<IndexDocument>, AppError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), AppError> {
        self.documents.write().await.remove(id);
        Ok(())
    }
}

/// Builds the index document for a FileSet.
pub struct FileSetIndexer;

impl FileSetIndexer {
    /// Path the thumbnail of `file_set_id` is served from.
    pub fn thumbnail_path(file_set_id: &ResourceId) -> String {
        format!(
            "{}/{}?file={}",
            DOWNLOADS_PATH_PREFIX, file_set_id, THUMBNAIL_DERIVATIVE_NAME
        )
    }

    pub fn to_document(file_set: &FileSet) -> IndexDocument {
        let file_ids: Vec<&str> = file_set.file_ids.iter().map(ResourceId::as_str).collect();
        let mut document = IndexDocument::new(file_set.id.clone())
            .with("has_model_ssim", json!("FileSet"))
            .with("title_tesim", json!(file_set.title))
            .with("file_ids_ssim", json!(file_ids))
            .with("date_modified_dtsi", json!(file_set.updated_at.to_rfc3339()));

        if let Some(label) = &file_set.label {
            document = document.with("label_tesim", json!(label));
        }
        if let Some(depositor) = &file_set.depositor {
            document = document.with("depositor_ssim", json!(depositor));
        }
        if let Some(original) = file_set.original_file_id() {
            document = document.with("original_file_id_ssi", json!(original.as_str()));
        }
        if let Some(thumbnail) = file_set.thumbnail_id() {
            document = document
                .with("thumbnail_id_ssi", json!(thumbnail.as_str()))
                .with("thumbnail_path_ss", json!(Self::thumbnail_path(&file_set.id)));
        }
        if let Some(text) = file_set.extracted_text_id() {
            document = document.with("extracted_text_id_ssi", json!(text.as_str()));
        }
        document
    }

    pub async fn index(index: &dyn SearchIndex, file_set: &FileSet) -> Result<(), AppError> {
        index.save(Self::to_document(file_set)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_core::models::{FileMetadata, Use};

    #[test]
    fn thumbnail_path_is_indexed_only_with_a_thumbnail() {
        let mut fs = FileSet::with_id(ResourceId::new("fs-1"));
        fs.apply_default_title("image.png");
        let original =
            FileMetadata::new(fs.id.clone(), "image.png", "image/png", 1, Use::OriginalFile);
        fs.attach(&original);

        let doc = FileSetIndexer::to_document(&fs);
        assert!(doc.get("thumbnail_path_ss").is_none());
        assert_eq!(doc.get("title_tesim"), Some(&json!(["image.png"])));

        let thumb = FileMetadata::new(fs.id.clone(), "thumb.jpeg", "image/jpeg", 1, Use::Thumbnail);
        fs.attach(&thumb);
        let doc = FileSetIndexer::to_document(&fs);
        assert_eq!(
            doc.get_str("thumbnail_path_ss"),
            Some("/downloads/fs-1?file=thumbnail")
        );
        assert_eq!(doc.get("file_ids_ssim").and_then(Value::as_array).map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn in_memory_index_replaces_documents() {
        let index = InMemorySearchIndex::new();
        let id = ResourceId::new("fs-1");
        index
            .save(IndexDocument::new(id.clone()).with("label_tesim", json!("a")))
            .await
            .unwrap();
        index
            .save(IndexDocument::new(id.clone()).with("label_tesim", json!("b")))
            .await
            .unwrap();

        let doc = index.find(&id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("label_tesim"), Some("b"));
        assert_eq!(index.len().await, 1);

        index.delete(&id).await.unwrap();
        assert!(index.is_empty().await);
    }
}
