//! Summarization backends.
//!
//! Same selection pattern as the OCR side: OpenAI, then Gemini, then a
//! deterministic mock keyed off word count. Long inputs are truncated to a
//! backend-specific character budget before being sent upstream; the stored
//! extracted text is never touched.

pub mod gemini;
pub mod openai;

use crate::config::AppConfig;
use crate::error::ApiResult;
use std::sync::Arc;
use tracing::info;

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;
    async fn summarize(&self, text: &str) -> ApiResult<String>;
}

/// Deterministic summarizer: three fixed sentences keyed off word count.
pub struct MockSummarizer;

#[async_trait::async_trait]
impl Summarizer for MockSummarizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn summarize(&self, text: &str) -> ApiResult<String> {
        let word_count = text.split_whitespace().count();
        let summary = if word_count < 10 {
            "This is a short document with minimal content."
        } else if word_count < 50 {
            "This document contains moderate content that has been processed for summarization."
        } else {
            "This is a comprehensive document with substantial content that has been analyzed \
             and summarized for easy understanding."
        };
        Ok(summary.to_string())
    }
}

/// Pick the first configured backend: OpenAI, Gemini, mock.
pub fn build_summarizer(config: &AppConfig, client: &reqwest::Client) -> Arc<dyn Summarizer> {
    if let Some(endpoint) = &config.openai {
        info!("Summary backend: openai ({})", endpoint.url);
        return Arc::new(openai::OpenAiSummarizer::new(
            endpoint.clone(),
            client.clone(),
        ));
    }
    if let Some(endpoint) = &config.gemini {
        info!("Summary backend: gemini ({})", endpoint.url);
        return Arc::new(gemini::GeminiSummarizer::new(
            endpoint.clone(),
            client.clone(),
        ));
    }
    info!("No summary backend configured, using mock summarizer");
    Arc::new(MockSummarizer)
}

/// Truncate to at most `max_chars`, appending an ellipsis marker. Respects
/// UTF-8 char boundaries.
pub(crate) fn truncate_for_upstream(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_summary_tiers() {
        let short = MockSummarizer.summarize("hello world").await.unwrap();
        assert!(short.contains("short document"));

        let medium_text = "word ".repeat(20);
        let medium = MockSummarizer.summarize(&medium_text).await.unwrap();
        assert!(medium.contains("moderate content"));

        let long_text = "word ".repeat(100);
        let long = MockSummarizer.summarize(&long_text).await.unwrap();
        assert!(long.contains("comprehensive document"));
    }

    #[test]
    fn test_truncate_short_input_untouched() {
        assert_eq!(truncate_for_upstream("hello", 4000), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 'é' is two bytes; a cut inside it must back off to the boundary.
        let text = "aé".repeat(100);
        let truncated = truncate_for_upstream(&text, 4);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 7);
        assert!(truncated.is_char_boundary(truncated.len() - 3));
    }

    #[test]
    fn test_truncate_budget_applies() {
        let text = "x".repeat(5000);
        let truncated = truncate_for_upstream(&text, 4000);
        assert_eq!(truncated.len(), 4003);
    }
}
