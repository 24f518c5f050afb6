//! HTTP surface for Campus Search.
//!
//! This module exposes an Axum router under `/api`:
//!
//! - `POST /upload` – Multipart upload (`file`, optional `department`); the file is extracted,
//!   chunked, embedded, and stored. Returns `{ message, document_id, chunks }`.
//! - `POST /search` – Rank the caller's department against `{ "query" }` and return
//!   `{ results, summary, related_docs }`.
//! - `GET /search/recommendations` – Most recent documents of the caller's department.
//! - `GET /search/history` – Queries previously issued by the caller.
//! - `POST /summarize` – Summarize arbitrary `{ "text" }`.
//! - `DELETE /documents/:id` – Remove a document of the caller's department.
//! - `GET /admin/documents` – Every document, newest first (admin only).
//! - `GET /admin/stats` – Stored document and search totals (admin only).
//! - `GET /metrics`, `GET /health`, `GET /commands` – Diagnostics and discovery.
//!
//! The caller's identity arrives in the `x-user-id`, `x-user-department`, and optional
//! `x-user-role` headers set by the upstream auth layer. Errors are returned as
//! `{ "message": ... }`; internal failures are logged and reported as `Server error`.

use crate::metrics::MetricsSnapshot;
use crate::processing::{
    CurrentUser, DocumentError, IngestError, ProcessingApi, SearchError, SearchResult,
    SummarizeError, UploadedFile, now_rfc3339,
};
use crate::store::{DocumentSummary, SearchHistoryEntry, StoreError, StoreStats};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRequestParts, Multipart, Path, State, multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's department.
pub const USER_DEPARTMENT_HEADER: &str = "x-user-department";
/// Header carrying the authenticated user's role; `admin` unlocks the admin routes.
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Largest accepted request body, sized for document uploads.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the HTTP router exposing the search API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    create_router_with_body_limit(service, MAX_UPLOAD_BYTES)
}

/// Build the router with a custom request body limit in bytes.
pub fn create_router_with_body_limit<S>(service: Arc<S>, body_limit: usize) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/api/upload", post(upload_document::<S>))
        .route("/api/search", post(search::<S>))
        .route("/api/search/recommendations", get(recommendations::<S>))
        .route("/api/search/history", get(search_history::<S>))
        .route("/api/summarize", post(summarize::<S>))
        .route("/api/documents/:id", delete(delete_document::<S>))
        .route("/api/admin/documents", get(admin_documents::<S>))
        .route("/api/admin/stats", get(admin_stats::<S>))
        .route("/api/metrics", get(get_metrics::<S>))
        .route("/api/health", get(health))
        .route("/api/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Caller identity extracted from the auth headers.
struct AuthenticatedUser(CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match (
            header_value(parts, USER_ID_HEADER),
            header_value(parts, USER_DEPARTMENT_HEADER),
        ) {
            (Some(id), Some(department)) => Ok(Self(CurrentUser { id, department })),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// Authenticated caller whose role header is `admin`.
struct AdminUser(CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        match header_value(parts, USER_ROLE_HEADER) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Ok(Self(user)),
            _ => {
                tracing::warn!(user = %user.id, "Admin route refused");
                Err(AppError::Forbidden)
            }
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Unwrap a JSON body, reporting any malformed payload with the field's validation message.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, missing: &str) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected JSON body");
            Err(AppError::BadRequest(missing.to_string()))
        }
    }
}

/// Success response for `POST /api/upload`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document_id: String,
    chunks: usize,
}

/// Accept a multipart upload and run it through the ingestion pipeline.
///
/// The optional `department` field overrides the caller's own department.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: ProcessingApi,
{
    let mut file = None;
    let mut department = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("department") => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    department = Some(value);
                }
            }
            _ => {}
        }
    }
    let file = file.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
    let department = department.unwrap_or_else(|| user.department.clone());

    let document = service.ingest(file, &department, &user.id).await?;
    tracing::info!(
        document_id = %document.id,
        department = %document.department,
        user = %user.id,
        chunks = document.chunks.len(),
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        chunks: document.chunks.len(),
        document_id: document.id,
    }))
}

/// Request body for `POST /api/search`.
#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

/// Search the caller's department.
async fn search<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, AppError>
where
    S: ProcessingApi,
{
    let request = json_body(payload, "Query is required")?;
    let result = service.search_for_user(&user, &request.query).await?;
    Ok(Json(result))
}

/// Most recent documents of the caller's department.
async fn recommendations<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<DocumentSummary>>, AppError>
where
    S: ProcessingApi,
{
    Ok(Json(service.recommendations(&user.department).await?))
}

async fn search_history<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<SearchHistoryEntry>>, AppError>
where
    S: ProcessingApi,
{
    Ok(Json(service.search_history(&user.id).await?))
}

/// Request body for `POST /api/summarize`.
#[derive(Deserialize)]
struct SummarizeRequest {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn summarize<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: ProcessingApi,
{
    let request = json_body(payload, "Text is required")?;
    let summary = service.summarize_text(&request.text).await?;
    Ok(Json(SummarizeResponse { summary }))
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn delete_document<S>(
    State(service): State<Arc<S>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError>
where
    S: ProcessingApi,
{
    service.delete_document(&user, &id).await?;
    tracing::info!(document_id = %id, user = %user.id, "Delete request completed");
    Ok(Json(MessageResponse {
        message: "Document deleted successfully",
    }))
}

/// Every stored document across departments, newest first.
async fn admin_documents<S>(
    State(service): State<Arc<S>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<DocumentSummary>>, AppError>
where
    S: ProcessingApi,
{
    Ok(Json(service.list_documents().await?))
}

async fn admin_stats<S>(
    State(service): State<Arc<S>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<StoreStats>, AppError>
where
    S: ProcessingApi,
{
    Ok(Json(service.stats().await?))
}

/// Return ingestion and search counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "Server is running",
        "timestamp": now_rfc3339(),
    }))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /api/commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/api/upload",
                description: "Multipart upload of a .pdf, .docx, or .txt file (field `file`, optional `department`). The text is chunked, embedded, and stored. Response returns { \"message\", \"document_id\", \"chunks\" }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/api/search",
                description: "Rank chunks of the caller's department against a query and summarize the best matches.",
                request_example: Some(json!({ "query": "graph algorithms" })),
            },
            CommandDescriptor {
                name: "recommendations",
                method: "GET",
                path: "/api/search/recommendations",
                description: "Return the most recently uploaded documents of the caller's department.",
                request_example: None,
            },
            CommandDescriptor {
                name: "search_history",
                method: "GET",
                path: "/api/search/history",
                description: "Return the caller's previous queries, oldest first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/api/summarize",
                description: "Summarize arbitrary text with the configured chat-completion model.",
                request_example: Some(json!({ "text": "Lecture notes to condense" })),
            },
            CommandDescriptor {
                name: "delete_document",
                method: "DELETE",
                path: "/api/documents/:id",
                description: "Delete a document of the caller's department and all of its chunks.",
                request_example: None,
            },
            CommandDescriptor {
                name: "admin_documents",
                method: "GET",
                path: "/api/admin/documents",
                description: "List every document across departments, newest first. Requires `x-user-role: admin`.",
                request_example: None,
            },
            CommandDescriptor {
                name: "admin_stats",
                method: "GET",
                path: "/api/admin/stats",
                description: "Return stored document and search totals. Requires `x-user-role: admin`.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/api/metrics",
                description: "Return ingestion and search counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Failure returned by a handler, rendered as `{ "message": ... }`.
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    PayloadTooLarge(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required".into()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Access denied".into()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            Self::BadGateway(message) => {
                tracing::warn!(error = %message, "Upstream provider failed");
                (StatusCode::BAD_GATEWAY, message)
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".into())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        let message = error.to_string();
        match error {
            IngestError::InvalidDepartment
            | IngestError::Extraction(_)
            | IngestError::Chunking(_) => Self::BadRequest(message),
            IngestError::Embedding(_) => Self::BadGateway(message),
            IngestError::Upload(_) | IngestError::Persistence(_) => Self::Internal(message),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(error: SearchError) -> Self {
        let message = error.to_string();
        match error {
            SearchError::InvalidQuery => Self::BadRequest(message),
            SearchError::Embedding(_) => Self::BadGateway(message),
            SearchError::Scoring { .. } | SearchError::Persistence(_) => Self::Internal(message),
        }
    }
}

impl From<SummarizeError> for AppError {
    fn from(error: SummarizeError) -> Self {
        let message = error.to_string();
        match error {
            SummarizeError::EmptyText => Self::BadRequest(message),
            SummarizeError::Provider(_) => Self::BadGateway(message),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(error: DocumentError) -> Self {
        let message = error.to_string();
        match error {
            DocumentError::NotFound(_) => Self::NotFound(message),
            DocumentError::Persistence(_) => Self::Internal(message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        let status = error.status();
        let message = error.body_text();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(message)
        } else if status.is_server_error() {
            Self::Internal(message)
        } else {
            Self::BadRequest(message)
        }
    }
}
