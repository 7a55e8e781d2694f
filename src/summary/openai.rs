//! OpenAI chat-completions summarization backend.

use super::{truncate_for_upstream, Summarizer};
use crate::config::KeyedEndpoint;
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Character budget for text sent upstream; OpenAI enforces token limits.
const CHAR_BUDGET: usize = 4000;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise summaries of \
     documents. Provide a clear, well-structured summary in 2-3 sentences.";

pub struct OpenAiSummarizer {
    endpoint: KeyedEndpoint,
    client: reqwest::Client,
}

impl OpenAiSummarizer {
    pub fn new(endpoint: KeyedEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }
}

// ── Request/response types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamError {
    message: String,
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn summarize(&self, text: &str) -> ApiResult<String> {
        let text = truncate_for_upstream(text, CHAR_BUDGET);
        debug!("OpenAiSummarizer: sending {} chars", text.len());

        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Please summarize the following document text:\n\n{text}"),
                },
            ],
            max_tokens: 150,
            temperature: 0.3,
        };

        let resp = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Summarization(format!("OpenAI request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Summarization(format!(
                "OpenAI API error ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Summarization(format!("OpenAI response parse failed: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ApiError::Summarization(format!("OpenAI error: {}", err.message)));
        }

        let summary = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if summary.is_empty() {
            return Err(ApiError::Summarization("no response from OpenAI".to_string()));
        }

        info!("OpenAiSummarizer: received {} chars", summary.len());
        Ok(summary)
    }
}
