//! Google Vision OCR backend.
//!
//! Authenticates with a service account JSON key: an RS256 JWT is exchanged
//! for an OAuth2 access token, which is cached until shortly before expiry.

use super::TextExtractor;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
const CLOUD_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: u64,
}

pub struct VisionExtractor {
    client: reqwest::Client,
    sa_key: ServiceAccountKey,
    token_cache: Arc<Mutex<Option<CachedToken>>>,
}

impl VisionExtractor {
    /// Build from config if a readable service account key is configured.
    pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Option<Self> {
        let key_path = config.google_credentials_path.as_ref()?;

        let key_json = match std::fs::read_to_string(key_path) {
            Ok(json) => json,
            Err(e) => {
                warn!("GOOGLE_APPLICATION_CREDENTIALS={} unreadable: {}", key_path, e);
                return None;
            }
        };

        let sa_key: ServiceAccountKey = match serde_json::from_str(&key_json) {
            Ok(k) => k,
            Err(e) => {
                warn!("Failed to parse service account key: {}", e);
                return None;
            }
        };

        Some(Self {
            client,
            sa_key,
            token_cache: Arc::new(Mutex::new(None)),
        })
    }

    /// Get a valid access token, refreshing if expired.
    async fn access_token(&self) -> ApiResult<String> {
        {
            let cache = self.token_cache.lock().unwrap();
            if let Some(ref cached) = *cache {
                if now_secs() < cached.expires_at.saturating_sub(60) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let now = now_secs();
        let claims = json!({
            "iss": self.sa_key.client_email,
            "scope": CLOUD_SCOPE,
            "aud": TOKEN_URI,
            "iat": now,
            "exp": now + 3600,
        });

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let encoding_key =
            jsonwebtoken::EncodingKey::from_rsa_pem(self.sa_key.private_key.as_bytes())
                .map_err(|e| ApiError::Extraction(format!("invalid service account key: {e}")))?;
        let jwt = jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| ApiError::Extraction(format!("failed to encode JWT: {e}")))?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let resp: TokenResponse = self
            .client
            .post(TOKEN_URI)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Extraction(format!("token exchange failed: {e}")))?
            .error_for_status()
            .map_err(|e| ApiError::Extraction(format!("token exchange rejected: {e}")))?
            .json()
            .await
            .map_err(|e| ApiError::Extraction(format!("token response parse failed: {e}")))?;

        let token = resp.access_token.clone();
        {
            let mut cache = self.token_cache.lock().unwrap();
            *cache = Some(CachedToken {
                access_token: resp.access_token,
                expires_at: now + resp.expires_in,
            });
        }

        Ok(token)
    }
}

// ── Vision API response types ───────────────────────────────────────────────

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default, rename = "textAnnotations")]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<VisionError>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    description: String,
}

#[derive(Deserialize)]
struct VisionError {
    message: String,
}

#[async_trait::async_trait]
impl TextExtractor for VisionExtractor {
    fn name(&self) -> &str {
        "google_vision"
    }

    async fn extract(&self, data: &[u8]) -> ApiResult<String> {
        let token = self.access_token().await?;

        let body = json!({
            "requests": [{
                "image": { "content": BASE64.encode(data) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        });

        info!("VisionExtractor: annotating {} bytes", data.len());

        let resp = self
            .client
            .post(VISION_URL)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Extraction(format!("Vision request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Extraction(format!(
                "Vision API error ({status}): {text}"
            )));
        }

        let annotated: AnnotateResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Extraction(format!("Vision response parse failed: {e}")))?;

        let image = annotated
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Extraction("no text detected".to_string()))?;

        if let Some(err) = image.error {
            return Err(ApiError::Extraction(err.message));
        }
        if image.text_annotations.is_empty() {
            return Err(ApiError::Extraction("no text detected".to_string()));
        }

        let text = image
            .text_annotations
            .into_iter()
            .map(|a| a.description)
            .collect::<Vec<_>>()
            .join("\n");

        debug!("VisionExtractor: extracted {} chars", text.len());
        Ok(text)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
