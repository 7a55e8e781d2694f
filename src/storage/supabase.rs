//! Supabase-backed document store.
//!
//! Metadata lives in a `documents` table reached through PostgREST; uploaded
//! bytes live in a Storage bucket under `users/<owner>/<id>`. All calls use
//! the service role key.

use super::DocumentStore;
use crate::document::{DocStatus, Document, StageStatus};
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_role_key: String,
    bucket: String,
}

/// Row shape of the `documents` table.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentRow {
    id: String,
    user_id: String,
    filename: String,
    size: i64,
    mime_type: String,
    upload_date: DateTime<Utc>,
    status: DocStatus,
    ocr_status: StageStatus,
    summary_status: StageStatus,
    #[serde(default)]
    ocr_text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    storage_path: String,
}

impl DocumentRow {
    fn from_document(doc: &Document, storage_path: String) -> Self {
        Self {
            id: doc.id.clone(),
            user_id: doc.user_id.clone(),
            filename: doc.filename.clone(),
            size: doc.size as i64,
            mime_type: doc.mime_type.clone(),
            upload_date: doc.upload_date,
            status: doc.status,
            ocr_status: doc.ocr_status,
            summary_status: doc.summary_status,
            ocr_text: doc.ocr_text.clone(),
            summary: doc.summary.clone(),
            storage_path,
        }
    }

    fn into_document(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            filename: self.filename,
            size: self.size as u64,
            mime_type: self.mime_type,
            upload_date: self.upload_date,
            status: self.status,
            ocr_status: self.ocr_status,
            summary_status: self.summary_status,
            ocr_text: self.ocr_text,
            summary: self.summary,
        }
    }
}

impl SupabaseStore {
    pub fn new(client: Client, base_url: String, service_role_key: String, bucket: String) -> Self {
        Self {
            client,
            base_url,
            service_role_key,
            bucket,
        }
    }

    fn object_path(owner_id: &str, id: &str) -> String {
        format!("users/{owner_id}/{id}")
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/documents", self.base_url)
    }

    /// PostgREST filter on both key columns. Values go through `reqwest`
    /// query encoding, so ids with reserved characters cannot corrupt the
    /// filter.
    fn row_filter(id: &str, owner_id: &str) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{id}")),
            ("user_id", format!("eq.{owner_id}")),
        ]
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    async fn fetch_rows(&self, query: &[(&str, String)]) -> ApiResult<Vec<DocumentRow>> {
        let resp = self
            .client
            .get(self.rest_url())
            .query(query)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("Supabase query failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::StorageWrite(format!(
                "Supabase query failed ({status}): {text}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("Supabase response parse failed: {e}")))
    }

    async fn delete_object(&self, path: &str) -> ApiResult<()> {
        let resp = self
            .client
            .delete(self.object_url(path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("Storage delete failed: {e}")))?;

        // Already-gone objects are fine: metadata removal still proceeds.
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::StorageWrite(format!(
                "Storage delete failed ({status}): {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for SupabaseStore {
    async fn create(
        &self,
        owner_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<Document> {
        let doc = Document::new(owner_id, filename, mime_type, data.len() as u64);
        let path = Self::object_path(owner_id, &doc.id);

        let resp = self
            .client
            .post(self.object_url(&path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Content-Type", mime_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("Storage upload failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::StorageWrite(format!(
                "Storage upload failed ({status}): {text}"
            )));
        }

        let row = DocumentRow::from_document(&doc, path.clone());
        let resp = self
            .client
            .post(format!("{}/rest/v1/documents", self.base_url))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await;

        let insert_err = match resp {
            Ok(resp) if resp.status().is_success() => None,
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                Some(format!("metadata insert failed ({status}): {text}"))
            }
            Err(e) => Some(format!("metadata insert failed: {e}")),
        };

        if let Some(message) = insert_err {
            // Metadata write failed: remove the uploaded object so no bytes
            // are left behind without a record.
            if let Err(cleanup) = self.delete_object(&path).await {
                warn!("Failed to remove object after insert error: {}", cleanup);
            }
            return Err(ApiError::StorageWrite(message));
        }

        debug!("Created document {} at {}", doc.id, path);
        Ok(doc)
    }

    async fn get(&self, id: &str, owner_id: &str) -> ApiResult<Document> {
        // Filtering on both columns makes ownership mismatch indistinguishable
        // from a missing document.
        let [id_filter, owner_filter] = Self::row_filter(id, owner_id);
        let rows = self
            .fetch_rows(&[id_filter, owner_filter, ("select", "*".to_string())])
            .await?;
        rows.into_iter()
            .next()
            .map(DocumentRow::into_document)
            .ok_or(ApiError::NotFound)
    }

    async fn list(&self, owner_id: &str, limit: usize) -> ApiResult<Vec<Document>> {
        let rows = self
            .fetch_rows(&[
                ("user_id", format!("eq.{owner_id}")),
                ("select", "*".to_string()),
                ("order", "upload_date.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .await?;
        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }

    async fn update(&self, doc: &Document) -> ApiResult<()> {
        let body = json!({
            "status": doc.status,
            "ocr_status": doc.ocr_status,
            "summary_status": doc.summary_status,
            "ocr_text": doc.ocr_text,
            "summary": doc.summary,
        });

        let resp = self
            .client
            .patch(self.rest_url())
            .query(&Self::row_filter(&doc.id, &doc.user_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("metadata update failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::StorageWrite(format!(
                "metadata update failed ({status}): {text}"
            )));
        }

        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("metadata update parse failed: {e}")))?;
        if rows.is_empty() {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str, owner_id: &str) -> ApiResult<()> {
        // Ownership check first; also confirms existence for the 404 contract.
        self.get(id, owner_id).await?;

        self.delete_object(&Self::object_path(owner_id, id)).await?;

        let resp = self
            .client
            .delete(self.rest_url())
            .query(&Self::row_filter(id, owner_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ApiError::StorageWrite(format!("metadata delete failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::StorageWrite(format!(
                "metadata delete failed ({status}): {text}"
            )));
        }
        Ok(())
    }

    async fn open_content(&self, doc: &Document) -> ApiResult<Vec<u8>> {
        let path = Self::object_path(&doc.user_id, &doc.id);
        let resp = self
            .client
            .get(self.object_url(&path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ApiError::ContentUnavailable(format!("Storage read failed: {e}")))?;

        if resp.status().as_u16() == 404 {
            return Err(ApiError::ContentUnavailable(format!(
                "missing object for {}",
                doc.id
            )));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::ContentUnavailable(format!(
                "Storage read failed ({status}): {text}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::ContentUnavailable(format!("Storage read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
