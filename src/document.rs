//! Document metadata model and status derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-stage processing status (OCR and summarization each track their own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Overall document status, derived from the two stage statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

/// Derive the overall status from the two stage statuses.
///
/// The stored `status` field is only ever assigned from this function, so the
/// three fields cannot drift apart.
pub fn overall_status(ocr: StageStatus, summary: StageStatus) -> DocStatus {
    use StageStatus::*;
    if ocr == Completed && summary == Completed {
        DocStatus::Completed
    } else if ocr == Processing || summary == Processing {
        DocStatus::Processing
    } else if ocr == Failed || summary == Failed {
        DocStatus::Failed
    } else {
        DocStatus::Uploaded
    }
}

/// A stored document and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub upload_date: DateTime<Utc>,
    pub status: DocStatus,
    pub ocr_status: StageStatus,
    pub summary_status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Document {
    /// Create a freshly uploaded document: `(uploaded, pending, pending)`.
    pub fn new(user_id: &str, filename: &str, mime_type: &str, size: u64) -> Self {
        Self {
            id: format!("doc_{}", Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            size,
            mime_type: mime_type.to_string(),
            upload_date: Utc::now(),
            status: DocStatus::Uploaded,
            ocr_status: StageStatus::Pending,
            summary_status: StageStatus::Pending,
            ocr_text: None,
            summary: None,
        }
    }

    /// Re-derive `status` after a stage status change.
    pub fn recompute_status(&mut self) {
        self.status = overall_status(self.ocr_status, self.summary_status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageStatus::*;

    #[test]
    fn test_new_document_defaults() {
        let doc = Document::new("user_1", "test.txt", "text/plain", 11);
        assert!(doc.id.starts_with("doc_"));
        assert_eq!(doc.status, DocStatus::Uploaded);
        assert_eq!(doc.ocr_status, Pending);
        assert_eq!(doc.summary_status, Pending);
        assert!(doc.ocr_text.is_none());
        assert!(doc.summary.is_none());
    }

    #[test]
    fn test_overall_status_derivation() {
        assert_eq!(overall_status(Pending, Pending), DocStatus::Uploaded);
        assert_eq!(overall_status(Processing, Pending), DocStatus::Processing);
        assert_eq!(overall_status(Completed, Processing), DocStatus::Processing);
        // Extraction done but summary not yet started: back to uploaded.
        assert_eq!(overall_status(Completed, Pending), DocStatus::Uploaded);
        assert_eq!(overall_status(Completed, Completed), DocStatus::Completed);
        assert_eq!(overall_status(Failed, Pending), DocStatus::Failed);
        assert_eq!(overall_status(Completed, Failed), DocStatus::Failed);
        // A stage still in flight takes precedence over a failure.
        assert_eq!(overall_status(Failed, Processing), DocStatus::Processing);
    }

    #[test]
    fn test_wire_field_names() {
        let doc = Document::new("user_1", "a.pdf", "application/pdf", 42);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["userId"], "user_1");
        assert_eq!(json["mimeType"], "application/pdf");
        assert_eq!(json["status"], "uploaded");
        assert_eq!(json["ocrStatus"], "pending");
        assert_eq!(json["summaryStatus"], "pending");
        // Absent texts are omitted from the wire form entirely.
        assert!(json.get("ocrText").is_none());
        assert!(json.get("summary").is_none());
    }
}
