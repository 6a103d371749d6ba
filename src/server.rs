//! HTTP front door.
//!
//! Serves the question-answering pipeline over a small JSON API so a web
//! page or another service can ask questions of the corpus.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version and corpus size) |
//! | `POST` | `/answer` | `{ "question" }` → `{ "answer", "sources" }` |
//! | `POST` | `/search` | `{ "query", "top_k"? }` → ranked documents with scores |
//! | `POST` | `/admin/rebuild` | Reload documents and rebuild the corpus (`?force=true` re-embeds everything) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `rebuild_in_progress` (409),
//! `provider_error` (502), `internal` (500). Provider responses and other
//! internal details are logged, never returned to the client.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser pages can call
//! the API directly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use scholar_rag_core::corpus::BuildReport;
use scholar_rag_core::models::{Metadata, SourceRef};
use scholar_rag_core::Error;

use crate::engine::RagEngine;
use crate::progress::NoProgress;

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(engine: Arc<RagEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/answer", post(handle_answer))
        .route("/search", post(handle_search))
        .route("/admin/rebuild", post(handle_rebuild))
        .layer(cors)
        .with_state(engine)
}

/// Bind to `bind_addr` and serve until the process exits.
pub async fn run_server(engine: Arc<RagEngine>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    println!("Scholar server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn internal() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal error".to_string(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => bad_request(msg),
            Error::RebuildInProgress => AppError {
                status: StatusCode::CONFLICT,
                code: "rebuild_in_progress",
                message: "a rebuild is already running".to_string(),
            },
            e if e.is_provider_error() => {
                tracing::error!(error = %e, "provider call failed");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "provider_error",
                    message: "the model provider could not complete the request; try again later"
                        .to_string(),
                }
            }
            e => {
                tracing::error!(error = %e, "request failed");
                internal()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(e) => e.into(),
            Err(other) => {
                tracing::error!(error = format!("{:#}", other), "request failed");
                internal()
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
}

async fn handle_health(State(engine): State<Arc<RagEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: engine.corpus().len(),
    })
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn handle_answer(
    State(engine): State<Arc<RagEngine>>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let answer = engine.answer(&req.question).await?;
    Ok(Json(AnswerResponse {
        answer: answer.answer_text,
        sources: answer.sources,
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchHit {
    id: String,
    score: f32,
    text: String,
    metadata: Metadata,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(engine): State<Arc<RagEngine>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = engine.search(&req.query, req.top_k).await?;
    Ok(Json(SearchResponse {
        results: results
            .into_iter()
            .map(|r| SearchHit {
                score: r.score,
                id: r.document.id,
                text: r.document.text,
                metadata: r.document.source_metadata,
            })
            .collect(),
    }))
}

// ============ POST /admin/rebuild ============

#[derive(Deserialize, Default)]
struct RebuildParams {
    #[serde(default)]
    force: bool,
}

async fn handle_rebuild(
    State(engine): State<Arc<RagEngine>>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<BuildReport>, AppError> {
    let report = engine.rebuild(params.force, &NoProgress).await?;
    Ok(Json(report))
}
