//! Environment-driven service configuration.
//!
//! Everything is read once at startup into an [`AppConfig`]. Backend clients
//! are optional: a missing URL/key pair simply disables that backend and the
//! provider selection falls through to the next candidate.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Which document store backs the service.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Process-local map, no persistence. Used by tests and quick dev runs.
    Memory,
    /// Files + JSON metadata sidecars under a base directory.
    Local { base_path: PathBuf },
    /// Supabase: PostgREST rows for metadata, Storage objects for content.
    Supabase {
        url: String,
        service_role_key: String,
        bucket: String,
    },
}

/// A configured HTTP backend: endpoint plus API key.
#[derive(Debug, Clone)]
pub struct KeyedEndpoint {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage: StorageBackend,
    /// Firebase Web API key; when set, bearer tokens are verified against the
    /// identity provider. Otherwise dev tokens are accepted.
    pub firebase_web_api_key: Option<String>,
    /// Path to a Google service account JSON key, enables the Vision backend.
    pub google_credentials_path: Option<String>,
    pub ocr_space: Option<KeyedEndpoint>,
    pub openai: Option<KeyedEndpoint>,
    pub gemini: Option<KeyedEndpoint>,
    /// Allowed CORS origins; empty means permissive.
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {raw}"))?,
            Err(_) => 8080,
        };

        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("supabase") => {
                let url = env::var("SUPABASE_URL")
                    .context("SUPABASE_URL required for supabase storage")?;
                let service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
                    .context("SUPABASE_SERVICE_ROLE_KEY required for supabase storage")?;
                let bucket = env::var("SUPABASE_STORAGE_BUCKET")
                    .unwrap_or_else(|_| "smartdoc-uploads".to_string());
                StorageBackend::Supabase {
                    url,
                    service_role_key,
                    bucket,
                }
            }
            Ok("local") | Err(_) => {
                let base_path =
                    env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
                StorageBackend::Local {
                    base_path: PathBuf::from(base_path),
                }
            }
            Ok(other) => bail!("Unknown STORAGE_BACKEND: {other}"),
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            storage,
            firebase_web_api_key: env::var("FIREBASE_WEB_API_KEY").ok(),
            google_credentials_path: env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            ocr_space: keyed_endpoint("OCR_SERVICE_URL", "OCR_API_KEY"),
            openai: keyed_endpoint("OPENAI_API_URL", "OPENAI_API_KEY"),
            gemini: keyed_endpoint("GEMINI_API_URL", "GEMINI_API_KEY"),
            cors_allowed_origins,
        })
    }
}

/// Read a URL/key env pair; both must be set for the backend to count as configured.
fn keyed_endpoint(url_var: &str, key_var: &str) -> Option<KeyedEndpoint> {
    let url = env::var(url_var).ok().filter(|s| !s.is_empty())?;
    let api_key = env::var(key_var).ok().filter(|s| !s.is_empty())?;
    Some(KeyedEndpoint { url, api_key })
}
