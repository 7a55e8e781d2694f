//! Gemini generateContent summarization backend.

use super::{truncate_for_upstream, Summarizer};
use crate::config::KeyedEndpoint;
use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Gemini accepts much larger contexts than the OpenAI path.
const CHAR_BUDGET: usize = 30_000;

pub struct GeminiSummarizer {
    endpoint: KeyedEndpoint,
    client: reqwest::Client,
}

impl GeminiSummarizer {
    pub fn new(endpoint: KeyedEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UpstreamError {
    message: String,
}

#[async_trait::async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn summarize(&self, text: &str) -> ApiResult<String> {
        let text = truncate_for_upstream(text, CHAR_BUDGET);
        debug!("GeminiSummarizer: sending {} chars", text.len());

        let body = json!({
            "contents": [{
                "parts": [{
                    "text": format!(
                        "Please provide a concise summary of the following document in 2-3 sentences:\n\n{text}"
                    ),
                }],
            }],
            "generationConfig": {
                "maxOutputTokens": 150,
                "temperature": 0.3,
            },
        });

        let resp = self
            .client
            .post(&self.endpoint.url)
            .header("x-goog-api-key", &self.endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Summarization(format!("Gemini request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Summarization(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Summarization(format!("Gemini response parse failed: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ApiError::Summarization(format!("Gemini error: {}", err.message)));
        }

        let summary = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        if summary.is_empty() {
            return Err(ApiError::Summarization("no response from Gemini".to_string()));
        }
        Ok(summary)
    }
}
