//! Document storage abstraction.
//!
//! A [`DocumentStore`] persists both the metadata record and the uploaded
//! bytes, keyed by `(document id, owner id)`. Ownership mismatches are
//! reported identically to missing documents so non-owners never learn a
//! document exists. The backend is chosen once at startup and injected as
//! `Arc<dyn DocumentStore>`.

pub mod local;
pub mod memory;
pub mod supabase;

use crate::config::StorageBackend;
use crate::document::Document;
use crate::error::ApiResult;
use std::sync::Arc;
use tracing::info;

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist uploaded bytes and create the metadata record. Neither half
    /// may survive alone: implementations clean up the bytes if the metadata
    /// write fails.
    async fn create(
        &self,
        owner_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<Document>;

    /// Fetch a document. `NotFound` covers both absent ids and ownership
    /// mismatches.
    async fn get(&self, id: &str, owner_id: &str) -> ApiResult<Document>;

    /// List up to `limit` documents for an owner, newest first.
    async fn list(&self, owner_id: &str, limit: usize) -> ApiResult<Vec<Document>>;

    /// Replace the mutable fields of an existing record. Identity and
    /// upload-time fields are never touched.
    async fn update(&self, doc: &Document) -> ApiResult<()>;

    /// Remove metadata and bytes together. Missing bytes do not block the
    /// metadata removal.
    async fn delete(&self, id: &str, owner_id: &str) -> ApiResult<()>;

    /// Read back the original uploaded bytes.
    async fn open_content(&self, doc: &Document) -> ApiResult<Vec<u8>>;
}

/// Build the store selected by configuration.
pub fn build_store(backend: &StorageBackend, client: &reqwest::Client) -> Arc<dyn DocumentStore> {
    match backend {
        StorageBackend::Memory => {
            info!("Using in-memory document store");
            Arc::new(memory::MemoryStore::new())
        }
        StorageBackend::Local { base_path } => {
            info!("Using local document store at {:?}", base_path);
            Arc::new(local::LocalStore::new(base_path.clone()))
        }
        StorageBackend::Supabase {
            url,
            service_role_key,
            bucket,
        } => {
            info!("Using Supabase document store (bucket: {})", bucket);
            Arc::new(supabase::SupabaseStore::new(
                client.clone(),
                url.clone(),
                service_role_key.clone(),
                bucket.clone(),
            ))
        }
    }
}

/// Copy the mutable fields of `updated` onto `existing`, leaving id, owner
/// and upload-time metadata as stored. Shared by the map- and file-backed
/// stores so immutability is enforced in one place.
pub(crate) fn apply_update(existing: &mut Document, updated: &Document) {
    existing.status = updated.status;
    existing.ocr_status = updated.ocr_status;
    existing.summary_status = updated.summary_status;
    existing.ocr_text = updated.ocr_text.clone();
    existing.summary = updated.summary.clone();
}
