//! Bearer-token authentication.
//!
//! Verification is delegated to the identity provider: when a Firebase Web
//! API key is configured, tokens are checked against the identitytoolkit
//! lookup endpoint. Without one the service runs in dev mode and accepts
//! self-issued base64 test tokens (mint one via `POST /auth/test-token`).

use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use tracing::warn;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Verified caller identity, inserted into request extensions by the
/// middleware and taken as an explicit handler parameter.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
}

pub enum TokenVerifier {
    Firebase {
        client: reqwest::Client,
        api_key: String,
    },
    Dev,
}

impl TokenVerifier {
    pub fn from_config(api_key: Option<&String>, client: &reqwest::Client) -> Self {
        match api_key {
            Some(key) => Self::Firebase {
                client: client.clone(),
                api_key: key.clone(),
            },
            None => {
                warn!("FIREBASE_WEB_API_KEY not set, accepting dev test tokens");
                Self::Dev
            }
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    /// Verify a bearer token, returning the owner id it identifies.
    pub async fn verify(&self, token: &str) -> ApiResult<String> {
        match self {
            Self::Firebase { client, api_key } => verify_firebase(client, api_key, token).await,
            Self::Dev => verify_dev_token(token)
                .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string())),
        }
    }
}

async fn verify_firebase(client: &reqwest::Client, api_key: &str, token: &str) -> ApiResult<String> {
    #[derive(serde::Deserialize)]
    struct LookupResponse {
        #[serde(default)]
        users: Vec<LookupUser>,
    }

    #[derive(serde::Deserialize)]
    struct LookupUser {
        #[serde(rename = "localId")]
        local_id: String,
    }

    let resp = client
        .post(format!("{IDENTITY_TOOLKIT_URL}?key={api_key}"))
        .json(&json!({ "idToken": token }))
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("auth service unreachable: {e}")))?;

    if !resp.status().is_success() {
        return Err(ApiError::Unauthorized("Invalid token".to_string()));
    }

    let lookup: LookupResponse = resp
        .json()
        .await
        .map_err(|e| ApiError::Internal(format!("auth response parse failed: {e}")))?;

    lookup
        .users
        .into_iter()
        .next()
        .map(|u| u.local_id)
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))
}

/// Mint a dev token: base64-encoded JSON claims, 24h expiry.
pub fn mint_dev_token(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "user_id": user_id,
        "iat": now,
        "exp": now + 24 * 3600,
        "iss": "smartdoc-dev",
        "aud": "smartdoc",
    });
    BASE64.encode(claims.to_string())
}

/// Decode and validate a dev token, returning its user id.
fn verify_dev_token(token: &str) -> Option<String> {
    let raw = BASE64.decode(token).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&raw).ok()?;

    if let Some(exp) = claims.get("exp").and_then(|v| v.as_i64()) {
        if chrono::Utc::now().timestamp() > exp {
            return None;
        }
    }

    claims
        .get("user_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Middleware guarding every document route.
pub async fn require_auth(
    State(state): State<crate::AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Authorization header required".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Bearer token required".to_string()))?;

    let user_id = state.verifier.verify(token).await?;
    request.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(request).await)
}
