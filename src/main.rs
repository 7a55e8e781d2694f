//! SmartDoc - document processing server with OCR and AI summarization.

mod auth;
mod config;
mod document;
mod error;
mod ocr;
mod storage;
mod summary;
mod workflow;

use auth::AuthUser;
use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use config::AppConfig;
use document::{Document, StageStatus};
use error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workflow::Workflow;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn storage::DocumentStore>,
    workflow: Arc<Workflow>,
    verifier: Arc<auth::TokenVerifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartdoc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // One shared outbound client; every backend call is bounded by this timeout.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let store = storage::build_store(&config.storage, &client);
    let extractor = ocr::build_extractor(&config, &client);
    let summarizer = summary::build_summarizer(&config, &client);
    let verifier = Arc::new(auth::TokenVerifier::from_config(
        config.firebase_web_api_key.as_ref(),
        &client,
    ));

    let state = AppState {
        workflow: Arc::new(Workflow::new(store.clone(), extractor, summarizer)),
        store,
        verifier,
    };

    let app = app(state, cors_layer(&config.cors_allowed_origins));

    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server listening on http://0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full router: public health/dev routes plus the authenticated
/// document routes.
fn app(state: AppState, cors: CorsLayer) -> Router {
    let protected = Router::new()
        .route("/docs/upload", post(upload_document))
        .route("/docs/history", get(document_history))
        .route("/docs/{id}", get(get_document).delete(delete_document))
        .route("/docs/{id}/ocr", post(trigger_ocr))
        .route("/docs/{id}/summary", post(trigger_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let mut public = Router::new().route("/health", get(health));
    if state.verifier.is_dev() {
        public = public.route("/auth/test-token", post(issue_test_token));
    }

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024)) // 32MB
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

// ============================================================================
// Response envelopes
// ============================================================================

/// Success envelope wrapping every JSON payload.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    message: String,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            data,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: usize,
    limit: usize,
    total: usize,
    total_pages: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryData {
    documents: Vec<Document>,
    pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrData {
    doc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocr_text: Option<String>,
    status: StageStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryData {
    doc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    status: StageStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Upload a document (multipart field `file`).
async fn upload_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<Document>>)> {
    let mut filename = String::new();
    let mut mime_type = "application/octet-stream".to_string();
    let mut data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("document").to_string();
            if let Some(ct) = field.content_type() {
                mime_type = ct.to_string();
            }
            data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?
                .to_vec();
            break;
        }
    }

    if data.is_empty() {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    }

    info!(
        "Received file: {} ({} bytes, {}) from {}",
        filename,
        data.len(),
        mime_type,
        user.user_id
    );

    let doc = state
        .workflow
        .upload(&user.user_id, &filename, &mime_type, data)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Document uploaded successfully", doc),
    ))
}

/// Run OCR on an uploaded document.
async fn trigger_ocr(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<OcrData>>> {
    let doc = state.workflow.run_extraction(&id, &user.user_id).await?;
    Ok(ApiResponse::ok(
        "OCR processing completed successfully",
        OcrData {
            doc_id: doc.id,
            ocr_text: doc.ocr_text,
            status: doc.ocr_status,
        },
    ))
}

/// Generate a summary from extracted text.
async fn trigger_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<SummaryData>>> {
    let doc = state.workflow.run_summarization(&id, &user.user_id).await?;
    Ok(ApiResponse::ok(
        "Summary generation completed successfully",
        SummaryData {
            doc_id: doc.id,
            summary: doc.summary,
            status: doc.summary_status,
        },
    ))
}

#[derive(Deserialize)]
struct HistoryQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

/// List the caller's documents, newest first.
async fn document_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ApiResponse<HistoryData>>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let documents = state.store.list(&user.user_id, limit).await?;
    let total = documents.len();

    Ok(ApiResponse::ok(
        "Document history retrieved successfully",
        HistoryData {
            documents,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: 1,
            },
        },
    ))
}

/// Get a single document.
async fn get_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Document>>> {
    let doc = state.store.get(&id, &user.user_id).await?;
    Ok(ApiResponse::ok(
        "Document details retrieved successfully",
        doc,
    ))
}

/// Delete a document and its content.
async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete(&id, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct TestTokenRequest {
    user_id: String,
}

#[derive(Serialize)]
struct TestTokenResponse {
    token: String,
    user_id: String,
}

/// Issue a dev token (registered only when Firebase auth is not configured).
async fn issue_test_token(
    Json(request): Json<TestTokenRequest>,
) -> ApiResult<Json<TestTokenResponse>> {
    if request.user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    Ok(Json(TestTokenResponse {
        token: auth::mint_dev_token(&request.user_id),
        user_id: request.user_id,
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-SMARTDOC-TEST-BOUNDARY";

    fn test_app() -> Router {
        let store: Arc<dyn storage::DocumentStore> =
            Arc::new(storage::memory::MemoryStore::new());
        let state = AppState {
            workflow: Arc::new(Workflow::new(
                store.clone(),
                Arc::new(ocr::MockExtractor),
                Arc::new(summary::MockSummarizer),
            )),
            store,
            verifier: Arc::new(auth::TokenVerifier::Dev),
        };
        app(state, CorsLayer::permissive())
    }

    fn bearer(user_id: &str) -> String {
        format!("Bearer {}", auth::mint_dev_token(user_id))
    }

    fn multipart_body(filename: &str, content: &str) -> Body {
        Body::from(format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        ))
    }

    fn upload_request(user_id: &str, filename: &str, content: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/docs/upload")
            .header("authorization", bearer(user_id))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(filename, content))
            .unwrap()
    }

    fn wrapped_request(method: &str, uri: &str, user_id: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", bearer(user_id))
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_requires_no_auth() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = test_app();
        let request = Request::builder()
            .method("GET")
            .uri("/docs/history")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_upload_ocr_summary_scenario() {
        let app = test_app();

        // Upload "hello world" as test.txt.
        let (status, json) = send(&app, upload_request("user_1", "test.txt", "hello world")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["filename"], "test.txt");
        assert_eq!(json["data"]["size"], 11);
        assert_eq!(json["data"]["status"], "uploaded");
        assert_eq!(json["data"]["ocrStatus"], "pending");
        assert_eq!(json["data"]["summaryStatus"], "pending");
        let id = json["data"]["id"].as_str().unwrap().to_string();

        // OCR with no real backend configured falls back to the mock.
        let (status, json) =
            send(&app, wrapped_request("POST", &format!("/docs/{id}/ocr"), "user_1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["data"]["ocrText"]
            .as_str()
            .unwrap()
            .contains("mock OCR result"));
        assert_eq!(json["data"]["status"], "completed");

        // Summarize the extracted text.
        let (status, json) = send(
            &app,
            wrapped_request("POST", &format!("/docs/{id}/summary"), "user_1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "completed");
        assert!(json["data"]["summary"].as_str().is_some());

        // Both stages done: overall status is completed.
        let (status, json) =
            send(&app, wrapped_request("GET", &format!("/docs/{id}"), "user_1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "completed");
        assert_eq!(json["data"]["ocrStatus"], "completed");
        assert_eq!(json["data"]["summaryStatus"], "completed");
    }

    #[tokio::test]
    async fn test_summary_before_ocr_is_bad_request() {
        let app = test_app();
        let (_, json) = send(&app, upload_request("user_1", "test.txt", "hello world")).await;
        let id = json["data"]["id"].as_str().unwrap().to_string();

        let (status, json) = send(
            &app,
            wrapped_request("POST", &format!("/docs/{id}/summary"), "user_1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "precondition_failed");
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/docs/upload")
            .header("authorization", bearer("user_1"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(format!("--{BOUNDARY}--\r\n")))
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_delete_twice_returns_not_found() {
        let app = test_app();
        let (_, json) = send(&app, upload_request("user_1", "test.txt", "bye")).await;
        let id = json["data"]["id"].as_str().unwrap().to_string();

        let (status, _) =
            send(&app, wrapped_request("DELETE", &format!("/docs/{id}"), "user_1")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) =
            send(&app, wrapped_request("DELETE", &format!("/docs/{id}"), "user_1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_documents_are_owner_scoped() {
        let app = test_app();
        let (_, json) = send(&app, upload_request("user_1", "mine.txt", "secret")).await;
        let id = json["data"]["id"].as_str().unwrap().to_string();

        // Another user sees the same 404 as for a nonexistent document.
        let (status, _) =
            send(&app, wrapped_request("GET", &format!("/docs/{id}"), "user_2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            send(&app, wrapped_request("GET", "/docs/doc_nonexistent", "user_2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_limit_returns_newest() {
        let app = test_app();
        for name in ["a.txt", "b.txt", "c.txt"] {
            send(&app, upload_request("user_1", name, "content")).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let (status, json) = send(
            &app,
            wrapped_request("GET", "/docs/history?limit=1", "user_1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let docs = json["data"]["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["filename"], "c.txt");
        assert_eq!(json["data"]["pagination"]["limit"], 1);
    }

    #[tokio::test]
    async fn test_issue_test_token_roundtrip() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/auth/test-token")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"user_id": "user_9"}"#))
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let token = json["token"].as_str().unwrap().to_string();

        // The minted token authenticates as that user.
        let request = Request::builder()
            .method("GET")
            .uri("/docs/history")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }
}
