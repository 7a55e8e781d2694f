//! Document processing workflow: upload → OCR → summarization.
//!
//! The only component with a state machine. Each stage moves its status
//! `pending → processing → completed|failed`, and the overall status is
//! re-derived from the two stage statuses on every transition. Stage runs are
//! triggered explicitly by the caller and execute inline; nothing retries and
//! nothing is queued. Re-triggering a finished stage re-runs it from
//! `processing` and overwrites the prior result.

use crate::document::{Document, StageStatus};
use crate::error::{ApiError, ApiResult};
use crate::ocr::TextExtractor;
use crate::storage::DocumentStore;
use crate::summary::Summarizer;
use std::sync::Arc;
use tracing::{error, info};

pub struct Workflow {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl Workflow {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            store,
            extractor,
            summarizer,
        }
    }

    /// Persist an upload. The new document starts `(uploaded, pending, pending)`.
    pub async fn upload(
        &self,
        owner_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<Document> {
        let doc = self.store.create(owner_id, filename, mime_type, data).await?;
        info!(
            "Uploaded {} ({}, {} bytes) for {}",
            doc.id, doc.filename, doc.size, owner_id
        );
        Ok(doc)
    }

    /// Run the extraction stage for a document.
    pub async fn run_extraction(&self, doc_id: &str, owner_id: &str) -> ApiResult<Document> {
        let mut doc = self.store.get(doc_id, owner_id).await?;

        doc.ocr_status = StageStatus::Processing;
        doc.recompute_status();
        self.store.update(&doc).await?;

        let data = match self.store.open_content(&doc).await {
            Ok(data) => data,
            Err(err) => return Err(self.fail_extraction(doc, err).await),
        };

        info!(
            "Running extraction for {} via {} backend",
            doc.id,
            self.extractor.name()
        );

        match self.extractor.extract(&data).await {
            Ok(text) => {
                doc.ocr_text = Some(text);
                doc.ocr_status = StageStatus::Completed;
                doc.recompute_status();
                self.store.update(&doc).await?;
                Ok(doc)
            }
            Err(err) => Err(self.fail_extraction(doc, err).await),
        }
    }

    /// Run the summarization stage. Requires a completed extraction.
    pub async fn run_summarization(&self, doc_id: &str, owner_id: &str) -> ApiResult<Document> {
        let mut doc = self.store.get(doc_id, owner_id).await?;

        if doc.ocr_status != StageStatus::Completed || doc.ocr_text.is_none() {
            return Err(ApiError::PreconditionFailed(
                "OCR must be completed before generating summary".to_string(),
            ));
        }

        doc.summary_status = StageStatus::Processing;
        doc.recompute_status();
        self.store.update(&doc).await?;

        info!(
            "Running summarization for {} via {} backend",
            doc.id,
            self.summarizer.name()
        );

        let text = doc.ocr_text.clone().unwrap_or_default();
        match self.summarizer.summarize(&text).await {
            Ok(summary) => {
                doc.summary = Some(summary);
                doc.summary_status = StageStatus::Completed;
                doc.recompute_status();
                self.store.update(&doc).await?;
                Ok(doc)
            }
            Err(err) => {
                doc.summary_status = StageStatus::Failed;
                doc.recompute_status();
                // The stage error takes precedence over a failing persist.
                if let Err(update_err) = self.store.update(&doc).await {
                    error!(
                        "Failed to persist summary failure for {}: {}",
                        doc.id, update_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Mark the extraction stage failed, persisting best-effort: the original
    /// failure is what the caller gets back.
    async fn fail_extraction(&self, mut doc: Document, err: ApiError) -> ApiError {
        doc.ocr_status = StageStatus::Failed;
        doc.recompute_status();
        if let Err(update_err) = self.store.update(&doc).await {
            error!(
                "Failed to persist extraction failure for {}: {}",
                doc.id, update_err
            );
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocStatus;
    use crate::ocr::MockExtractor;
    use crate::storage::memory::MemoryStore;
    use crate::summary::MockSummarizer;

    struct FailingExtractor;

    #[async_trait::async_trait]
    impl TextExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _data: &[u8]) -> ApiResult<String> {
            Err(ApiError::Extraction("backend exploded".to_string()))
        }
    }

    struct FailingSummarizer;

    #[async_trait::async_trait]
    impl Summarizer for FailingSummarizer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn summarize(&self, _text: &str) -> ApiResult<String> {
            Err(ApiError::Summarization("backend exploded".to_string()))
        }
    }

    /// Store whose content has gone missing out from under the metadata.
    struct LostContentStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl DocumentStore for LostContentStore {
        async fn create(
            &self,
            owner_id: &str,
            filename: &str,
            mime_type: &str,
            data: Vec<u8>,
        ) -> ApiResult<Document> {
            self.inner.create(owner_id, filename, mime_type, data).await
        }

        async fn get(&self, id: &str, owner_id: &str) -> ApiResult<Document> {
            self.inner.get(id, owner_id).await
        }

        async fn list(&self, owner_id: &str, limit: usize) -> ApiResult<Vec<Document>> {
            self.inner.list(owner_id, limit).await
        }

        async fn update(&self, doc: &Document) -> ApiResult<()> {
            self.inner.update(doc).await
        }

        async fn delete(&self, id: &str, owner_id: &str) -> ApiResult<()> {
            self.inner.delete(id, owner_id).await
        }

        async fn open_content(&self, _doc: &Document) -> ApiResult<Vec<u8>> {
            Err(ApiError::ContentUnavailable("content missing".to_string()))
        }
    }

    fn workflow_with(store: Arc<dyn DocumentStore>, extractor: Arc<dyn TextExtractor>) -> Workflow {
        Workflow::new(store, extractor, Arc::new(MockSummarizer))
    }

    #[tokio::test]
    async fn test_full_pipeline_with_mocks() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let wf = workflow_with(store.clone(), Arc::new(MockExtractor));

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello world".to_vec())
            .await
            .unwrap();
        assert_eq!(doc.status, DocStatus::Uploaded);

        let doc = wf.run_extraction(&doc.id, "user_1").await.unwrap();
        assert_eq!(doc.ocr_status, StageStatus::Completed);
        assert!(doc.ocr_text.as_deref().unwrap().contains("mock OCR result"));
        // Summary still pending, so overall drops back to uploaded.
        assert_eq!(doc.status, DocStatus::Uploaded);

        let doc = wf.run_summarization(&doc.id, "user_1").await.unwrap();
        assert_eq!(doc.summary_status, StageStatus::Completed);
        assert!(doc.summary.is_some());
        assert_eq!(doc.status, DocStatus::Completed);

        // Persisted state matches the returned document.
        let stored = store.get(&doc.id, "user_1").await.unwrap();
        assert_eq!(stored.status, DocStatus::Completed);
    }

    #[tokio::test]
    async fn test_summarization_requires_completed_extraction() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let wf = workflow_with(store.clone(), Arc::new(MockExtractor));

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();

        let err = wf.run_summarization(&doc.id, "user_1").await.unwrap_err();
        assert!(matches!(err, ApiError::PreconditionFailed(_)));

        // Nothing was mutated.
        let stored = store.get(&doc.id, "user_1").await.unwrap();
        assert_eq!(stored.summary_status, StageStatus::Pending);
        assert_eq!(stored.status, DocStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_extraction_failure_marks_document_failed() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let wf = workflow_with(store.clone(), Arc::new(FailingExtractor));

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();

        let err = wf.run_extraction(&doc.id, "user_1").await.unwrap_err();
        assert!(matches!(err, ApiError::Extraction(_)));

        let stored = store.get(&doc.id, "user_1").await.unwrap();
        assert_eq!(stored.ocr_status, StageStatus::Failed);
        assert_eq!(stored.status, DocStatus::Failed);
        assert!(stored.ocr_text.is_none());
    }

    #[tokio::test]
    async fn test_summarization_failure_marks_document_failed() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let wf = Workflow::new(
            store.clone(),
            Arc::new(MockExtractor),
            Arc::new(FailingSummarizer),
        );

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();
        wf.run_extraction(&doc.id, "user_1").await.unwrap();

        let err = wf.run_summarization(&doc.id, "user_1").await.unwrap_err();
        assert!(matches!(err, ApiError::Summarization(_)));

        let stored = store.get(&doc.id, "user_1").await.unwrap();
        assert_eq!(stored.summary_status, StageStatus::Failed);
        assert_eq!(stored.status, DocStatus::Failed);
        assert!(stored.summary.is_none());
        // The failed stage does not disturb the completed extraction.
        assert_eq!(stored.ocr_status, StageStatus::Completed);
        assert!(stored.ocr_text.as_deref().unwrap().contains("mock OCR result"));
    }

    #[tokio::test]
    async fn test_missing_content_marks_extraction_failed() {
        let store: Arc<dyn DocumentStore> = Arc::new(LostContentStore {
            inner: MemoryStore::new(),
        });
        let wf = workflow_with(store.clone(), Arc::new(MockExtractor));

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();

        let err = wf.run_extraction(&doc.id, "user_1").await.unwrap_err();
        assert!(matches!(err, ApiError::ContentUnavailable(_)));

        let stored = store.get(&doc.id, "user_1").await.unwrap();
        assert_eq!(stored.ocr_status, StageStatus::Failed);
        assert_eq!(stored.status, DocStatus::Failed);
        assert!(stored.ocr_text.is_none());
    }

    #[tokio::test]
    async fn test_retrigger_after_failure_recovers() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let failing = workflow_with(store.clone(), Arc::new(FailingExtractor));
        let working = workflow_with(store.clone(), Arc::new(MockExtractor));

        let doc = failing
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();
        failing.run_extraction(&doc.id, "user_1").await.unwrap_err();

        // An explicit re-trigger re-runs the stage from processing.
        let doc = working.run_extraction(&doc.id, "user_1").await.unwrap();
        assert_eq!(doc.ocr_status, StageStatus::Completed);
        assert_eq!(doc.status, DocStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_triggers_honor_ownership() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let wf = workflow_with(store.clone(), Arc::new(MockExtractor));

        let doc = wf
            .upload("user_1", "test.txt", "text/plain", b"hello".to_vec())
            .await
            .unwrap();

        let err = wf.run_extraction(&doc.id, "user_2").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        let err = wf.run_summarization(&doc.id, "user_2").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
