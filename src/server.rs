//! JSON HTTP API over the classification engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/classify` | Rank catalog codes for a product description |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/cache/stats` | Response cache counters |
//! | `POST` | `/cache/invalidate` | Drop one cached response |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "max_results must be between 1 and 50" } }
//! ```
//!
//! Only request validation produces errors. Upstream failures inside the
//! engine are downgraded and show up as `strategy: "unavailable"` in an
//! otherwise successful response.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::CacheStats;
use crate::config::Config;
use crate::engine::Engine;
use crate::models::{ClassifyResponse, SearchRequest};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Starts the HTTP server on `[server].bind` over the configured SQLite
/// catalog. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::open(config).await?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "classification server listening");
    axum::serve(listener, router(engine)).await?;

    Ok(())
}

/// Build the application router. Exposed so tests and embedding
/// applications can serve an engine over any backend.
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/classify", post(handle_classify))
        .route("/health", get(handle_health))
        .route("/cache/stats", get(handle_cache_stats))
        .route("/cache/invalidate", post(handle_invalidate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { engine })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code, e.g. `"bad_request"`.
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

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

// ============ POST /classify ============

#[derive(Deserialize)]
struct ClassifyBody {
    text: String,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Handler for `POST /classify`.
///
/// Empty or punctuation-only text is not an error: it yields an empty
/// result list with `strategy: "none"`.
async fn handle_classify(
    State(state): State<AppState>,
    body: Result<Json<ClassifyBody>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let Json(body) = body?;
    let retrieval = state.engine.retrieval();

    let max_results = match body.max_results {
        None => retrieval.default_max_results,
        Some(n) if n >= 1 && n <= retrieval.max_results_cap => n,
        Some(_) => {
            return Err(bad_request(format!(
                "max_results must be between 1 and {}",
                retrieval.max_results_cap
            )))
        }
    };

    let mut request = SearchRequest::new(body.text).with_max_results(max_results);
    if let Some(company_id) = body.company_id.filter(|c| !c.trim().is_empty()) {
        request = request.with_company(company_id);
    }

    Ok(Json(state.engine.classify(&request).await))
}

// ============ /cache ============

async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.engine.cache_stats())
}

#[derive(Deserialize)]
struct InvalidateBody {
    text: String,
    #[serde(default)]
    company_id: Option<String>,
}

#[derive(Serialize)]
struct InvalidateResponse {
    invalidated: bool,
}

async fn handle_invalidate(
    State(state): State<AppState>,
    body: Result<Json<InvalidateBody>, JsonRejection>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let Json(body) = body?;
    let company_id = body.company_id.as_deref().filter(|c| !c.trim().is_empty());
    state.engine.invalidate(company_id, &body.text);
    Ok(Json(InvalidateResponse { invalidated: true }))
}
