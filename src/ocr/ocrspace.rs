//! OCR.space backend: multipart upload against a configured endpoint.

use super::TextExtractor;
use crate::config::KeyedEndpoint;
use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use tracing::info;

pub struct OcrSpaceExtractor {
    endpoint: KeyedEndpoint,
    client: reqwest::Client,
}

impl OcrSpaceExtractor {
    pub fn new(endpoint: KeyedEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }
}

#[derive(Deserialize)]
struct OcrSpaceResponse {
    #[serde(default, rename = "ParsedResults")]
    parsed_results: Vec<ParsedResult>,
    #[serde(default, rename = "ErrorMessage")]
    error_message: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ParsedResult {
    #[serde(default, rename = "ParsedText")]
    parsed_text: String,
}

#[async_trait::async_trait]
impl TextExtractor for OcrSpaceExtractor {
    fn name(&self) -> &str {
        "ocr_space"
    }

    async fn extract(&self, data: &[u8]) -> ApiResult<String> {
        use reqwest::multipart::{Form, Part};

        info!("OcrSpaceExtractor: sending {} bytes", data.len());

        let part = Part::bytes(data.to_vec()).file_name("document");
        let form = Form::new()
            .text("apikey", self.endpoint.api_key.clone())
            .text("language", "eng")
            .text("isOverlayRequired", "false")
            .part("file", part);

        let resp = self
            .client
            .post(&self.endpoint.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Extraction(format!("OCR request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Extraction(format!(
                "OCR API error ({status}): {text}"
            )));
        }

        let parsed: OcrSpaceResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Extraction(format!("OCR response parse failed: {e}")))?;

        // ErrorMessage is a string or an array of strings depending on the failure.
        if let Some(message) = parsed.error_message {
            let is_empty = match &message {
                serde_json::Value::Null => true,
                serde_json::Value::String(s) => s.is_empty(),
                serde_json::Value::Array(a) => a.is_empty(),
                _ => false,
            };
            if !is_empty {
                return Err(ApiError::Extraction(format!("OCR error: {message}")));
            }
        }

        let text = parsed
            .parsed_results
            .into_iter()
            .next()
            .map(|r| r.parsed_text)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ApiError::Extraction("no text detected".to_string()));
        }
        Ok(text)
    }
}
