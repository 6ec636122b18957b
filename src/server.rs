//! JSON HTTP API over a [`PolicyAssistant`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | `{ "question": "..." }` → answer, sources, confidence |
//! | `GET`  | `/api/stats` | Total chunks and collection name |
//! | `POST` | `/api/ingest` | `{ "paths": [...]?, "clear": false }` → ingestion report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /api/ingest` reads paths on the server's filesystem; without
//! `paths` it ingests the configured documents directory.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `embedding_error` (502), `index_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::PolicyAssistant;
use crate::config::Config;
use crate::error::RagError;
use crate::ingest::IngestReport;
use crate::models::{IndexStats, Response as Answer};

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = Arc::new(PolicyAssistant::from_config(config).await?);
    let app = router(assistant);

    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Policy assistant listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed so tests can drive it without a socket.
pub fn router(assistant: Arc<PolicyAssistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/stats", get(handle_stats))
        .route("/api/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(assistant)
}

// ============ Errors ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            RagError::EmbeddingsDisabled => (StatusCode::BAD_REQUEST, "embeddings_disabled"),
            RagError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            RagError::Index(_) | RagError::PartialUpsert { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_error")
            }
            RagError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        tracing::warn!(code, error = %message, "request failed");
        AppError {
            status,
            code,
            message,
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

async fn handle_query(
    State(assistant): State<Arc<PolicyAssistant>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    Ok(Json(assistant.ask(question).await?))
}

async fn handle_stats(
    State(assistant): State<Arc<PolicyAssistant>>,
) -> Result<Json<IndexStats>, AppError> {
    Ok(Json(assistant.stats().await?))
}

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    clear: bool,
}

async fn handle_ingest(
    State(assistant): State<Arc<PolicyAssistant>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let report = match req.paths {
        Some(paths) if !paths.is_empty() => assistant.ingest_files(&paths, req.clear).await?,
        _ => assistant.ingest_all(req.clear).await?,
    };
    Ok(Json(report))
}
