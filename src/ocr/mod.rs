//! Text extraction backends.
//!
//! Defines the [`TextExtractor`] trait and the fixed-priority backend
//! selection: Google Vision, then OCR.space, then a deterministic mock. The
//! backend is chosen once at construction and used for the lifetime of the
//! service — there is no per-call fallback chaining.

pub mod ocrspace;
pub mod vision;

use crate::config::AppConfig;
use crate::error::ApiResult;
use std::sync::Arc;
use tracing::info;

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, data: &[u8]) -> ApiResult<String>;
}

/// Fixed text returned by the mock backend. Keeps the pipeline exercisable
/// with no external dependencies configured.
pub const MOCK_OCR_TEXT: &str = "This is a mock OCR result. In a real implementation, this \
     would contain the actual text extracted from the document image.";

/// Deterministic extractor that always succeeds.
pub struct MockExtractor;

#[async_trait::async_trait]
impl TextExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, _data: &[u8]) -> ApiResult<String> {
        Ok(MOCK_OCR_TEXT.to_string())
    }
}

/// Pick the first configured backend: Vision, OCR.space, mock.
pub fn build_extractor(config: &AppConfig, client: &reqwest::Client) -> Arc<dyn TextExtractor> {
    if let Some(vision) = vision::VisionExtractor::from_config(config, client.clone()) {
        info!("OCR backend: google_vision");
        return Arc::new(vision);
    }
    if let Some(endpoint) = &config.ocr_space {
        info!("OCR backend: ocr_space ({})", endpoint.url);
        return Arc::new(ocrspace::OcrSpaceExtractor::new(
            endpoint.clone(),
            client.clone(),
        ));
    }
    info!("No OCR backend configured, using mock extractor");
    Arc::new(MockExtractor)
}
