//! Local-disk document store.
//!
//! Layout: `<base>/users/<owner>/documents/<id>.bin` for the uploaded bytes
//! and `<id>.json` alongside it for the metadata record. The locator is
//! derived from `(owner, id)` so it never needs to be stored or updated.

use super::{apply_update, DocumentStore};
use crate::document::Document;
use crate::error::{ApiError, ApiResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn documents_dir(&self, owner_id: &str) -> PathBuf {
        self.base_path
            .join("users")
            .join(owner_id)
            .join("documents")
    }

    fn content_path(&self, owner_id: &str, id: &str) -> PathBuf {
        self.documents_dir(owner_id).join(format!("{id}.bin"))
    }

    fn metadata_path(&self, owner_id: &str, id: &str) -> PathBuf {
        self.documents_dir(owner_id).join(format!("{id}.json"))
    }

    async fn read_metadata(&self, path: &Path) -> ApiResult<Document> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApiError::NotFound)
            }
            Err(e) => return Err(ApiError::StorageWrite(format!("read metadata: {e}"))),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| ApiError::StorageWrite(format!("parse metadata {path:?}: {e}")))
    }

    async fn write_metadata(&self, path: &Path, doc: &Document) -> ApiResult<()> {
        let raw = serde_json::to_vec_pretty(doc)
            .map_err(|e| ApiError::StorageWrite(format!("encode metadata: {e}")))?;
        fs::write(path, raw)
            .await
            .map_err(|e| ApiError::StorageWrite(format!("write metadata: {e}")))
    }
}

#[async_trait::async_trait]
impl DocumentStore for LocalStore {
    async fn create(
        &self,
        owner_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<Document> {
        let doc = Document::new(owner_id, filename, mime_type, data.len() as u64);

        let dir = self.documents_dir(owner_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::StorageWrite(format!("create directory: {e}")))?;

        let content_path = self.content_path(owner_id, &doc.id);
        fs::write(&content_path, &data)
            .await
            .map_err(|e| ApiError::StorageWrite(format!("write content: {e}")))?;

        let metadata_path = self.metadata_path(owner_id, &doc.id);
        if let Err(e) = self.write_metadata(&metadata_path, &doc).await {
            // No orphaned bytes without a metadata record.
            if let Err(cleanup) = fs::remove_file(&content_path).await {
                warn!("Failed to clean up {:?} after metadata error: {}", content_path, cleanup);
            }
            return Err(e);
        }

        Ok(doc)
    }

    async fn get(&self, id: &str, owner_id: &str) -> ApiResult<Document> {
        let doc = self
            .read_metadata(&self.metadata_path(owner_id, id))
            .await?;
        if doc.user_id != owner_id {
            return Err(ApiError::NotFound);
        }
        Ok(doc)
    }

    async fn list(&self, owner_id: &str, limit: usize) -> ApiResult<Vec<Document>> {
        let dir = self.documents_dir(owner_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ApiError::StorageWrite(format!("read directory: {e}"))),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("read directory entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.read_metadata(&path).await {
                    Ok(doc) => docs.push(doc),
                    Err(e) => warn!("Skipping unreadable metadata {:?}: {}", path, e),
                }
            }
        }

        docs.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        docs.truncate(limit);
        Ok(docs)
    }

    async fn update(&self, doc: &Document) -> ApiResult<()> {
        let path = self.metadata_path(&doc.user_id, &doc.id);
        let mut existing = self.read_metadata(&path).await?;
        apply_update(&mut existing, doc);
        self.write_metadata(&path, &existing).await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> ApiResult<()> {
        // Ownership check before touching anything.
        self.get(id, owner_id).await?;

        let content_path = self.content_path(owner_id, id);
        match fs::remove_file(&content_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ApiError::StorageWrite(format!("delete content: {e}"))),
        }

        fs::remove_file(self.metadata_path(owner_id, id))
            .await
            .map_err(|e| ApiError::StorageWrite(format!("delete metadata: {e}")))
    }

    async fn open_content(&self, doc: &Document) -> ApiResult<Vec<u8>> {
        let path = self.content_path(&doc.user_id, &doc.id);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ApiError::ContentUnavailable(format!("missing content for {}", doc.id)),
            ),
            Err(e) => Err(ApiError::ContentUnavailable(format!("read content: {e}"))),
        }
    }
}
