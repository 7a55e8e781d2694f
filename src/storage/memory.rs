//! In-memory document store.
//!
//! A single mutex guards the map; it is held only for the duration of a map
//! mutation, never across an outbound call. Concurrent read-modify-write
//! sequences spanning a backend call can therefore still race (last write
//! wins) — that is the accepted contract.

use super::{apply_update, DocumentStore};
use crate::document::Document;
use crate::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::Mutex;

struct StoredDoc {
    doc: Document,
    content: Vec<u8>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, StoredDoc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        owner_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<Document> {
        let doc = Document::new(owner_id, filename, mime_type, data.len() as u64);
        let mut map = self.inner.lock().unwrap();
        map.insert(
            doc.id.clone(),
            StoredDoc {
                doc: doc.clone(),
                content: data,
            },
        );
        Ok(doc)
    }

    async fn get(&self, id: &str, owner_id: &str) -> ApiResult<Document> {
        let map = self.inner.lock().unwrap();
        match map.get(id) {
            Some(stored) if stored.doc.user_id == owner_id => Ok(stored.doc.clone()),
            _ => Err(ApiError::NotFound),
        }
    }

    async fn list(&self, owner_id: &str, limit: usize) -> ApiResult<Vec<Document>> {
        let map = self.inner.lock().unwrap();
        let mut docs: Vec<Document> = map
            .values()
            .filter(|stored| stored.doc.user_id == owner_id)
            .map(|stored| stored.doc.clone())
            .collect();
        docs.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        docs.truncate(limit);
        Ok(docs)
    }

    async fn update(&self, doc: &Document) -> ApiResult<()> {
        let mut map = self.inner.lock().unwrap();
        match map.get_mut(&doc.id) {
            Some(stored) => {
                apply_update(&mut stored.doc, doc);
                Ok(())
            }
            None => Err(ApiError::NotFound),
        }
    }

    async fn delete(&self, id: &str, owner_id: &str) -> ApiResult<()> {
        let mut map = self.inner.lock().unwrap();
        match map.get(id) {
            Some(stored) if stored.doc.user_id == owner_id => {
                map.remove(id);
                Ok(())
            }
            _ => Err(ApiError::NotFound),
        }
    }

    async fn open_content(&self, doc: &Document) -> ApiResult<Vec<u8>> {
        let map = self.inner.lock().unwrap();
        map.get(&doc.id)
            .map(|stored| stored.content.clone())
            .ok_or_else(|| ApiError::ContentUnavailable(format!("no content for {}", doc.id)))
    }
}
