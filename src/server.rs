//! JSON HTTP API over a shared [`Dashboard`].
//!
//! This is the dashboard's view layer for browser or script clients: every
//! panel of the support desk maps onto a small set of routes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/summary` | Entry, file, source and stakeholder counters |
//! | `GET`  | `/api/knowledge-base` | List entries |
//! | `POST` | `/api/knowledge-base` | Ingest `{"paths": [...]}` as one entry |
//! | `DELETE` | `/api/knowledge-base/{id}` | Remove an entry |
//! | `GET`  | `/api/knowledge-base/files?q=` | Filter files by name or path |
//! | `GET`  | `/api/rag-sources` | List RAG sources |
//! | `POST` | `/api/rag-sources/{id}/toggle` | Flip a source's active flag (`null` if unknown) |
//! | `POST` | `/api/query` | Ask `{"country", "question"}` |
//! | `GET`  | `/api/query/last` | Last successful answer, or `null` |
//! | `GET`  | `/api/stakeholders` | List stakeholders |
//! | `POST` | `/api/stakeholders` | Add a manual stakeholder |
//! | `PATCH` | `/api/stakeholders/{id}` | Partial update (`null` if unknown) |
//! | `DELETE` | `/api/stakeholders/{id}` | Remove a stakeholder |
//! | `POST` | `/api/stakeholders/generate` | Import stakeholders from the knowledge base |
//! | `GET`  | `/api/stakeholders/export.csv` | CSV download |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "busy", "message": "a query is already in progress" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `busy` (409),
//! `ingest_failed` (422), `agent_unreachable` (502).
//!
//! # CORS
//!
//! No CORS headers are sent unless `[server].cors_origins` lists the browser
//! origins of a front end. `"*"` allows any origin.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardError};
use crate::gateway::GatewayError;
use crate::ingest::IngestError;
use crate::models::{
    AgentResult, DashboardSummary, EntrySummary, FileListing, RagSource, Stakeholder,
    StakeholderPatch,
};

type AppState = Arc<Dashboard>;

/// Starts the HTTP server with a Gemini-backed dashboard.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let dashboard = Dashboard::from_config(config.clone())?;
    run_server_with(Arc::new(dashboard), &bind_addr).await
}

/// Starts the HTTP server over an existing dashboard.
///
/// Used by tests and embedders that supply their own [`crate::gateway::ModelClient`].
pub async fn run_server_with(dashboard: Arc<Dashboard>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(dashboard);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    println!("Sitter dashboard API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    let cors = cors_layer(&dashboard.config().server.cors_origins);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/summary", get(handle_summary))
        .route(
            "/api/knowledge-base",
            get(handle_list_entries).post(handle_ingest),
        )
        .route("/api/knowledge-base/files", get(handle_filter_files))
        .route(
            "/api/knowledge-base/{id}",
            axum::routing::delete(handle_remove_entry),
        )
        .route("/api/rag-sources", get(handle_list_sources))
        .route("/api/rag-sources/{id}/toggle", post(handle_toggle_source))
        .route("/api/query", post(handle_query))
        .route("/api/query/last", get(handle_last_result))
        .route(
            "/api/stakeholders",
            get(handle_list_stakeholders).post(handle_add_stakeholder),
        )
        .route("/api/stakeholders/generate", post(handle_generate))
        .route("/api/stakeholders/export.csv", get(handle_export_csv))
        .route(
            "/api/stakeholders/{id}",
            patch(handle_update_stakeholder).delete(handle_remove_stakeholder),
        )
        .with_state(dashboard);

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// CORS policy for the configured origins, or `None` to send no CORS headers.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values = origins.iter().filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        });
        AllowOrigin::list(values)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"busy"`).
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        let message = err.to_string();
        match err {
            DashboardError::InvalidInput(_) => bad_request(message),
            DashboardError::Busy(_) => AppError {
                status: StatusCode::CONFLICT,
                code: "busy",
                message,
            },
            DashboardError::Ingest(IngestError::NoSupportedDocuments) => bad_request(message),
            DashboardError::Ingest(IngestError::PathNotFound(_)) => not_found(message),
            DashboardError::Ingest(_) => AppError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "ingest_failed",
                message,
            },
            DashboardError::Gateway(e) => {
                tracing::warn!("agent call failed: {}", e);
                let message = match e {
                    GatewayError::Shape(_) => {
                        format!("the agent returned an unreadable answer: {}", message)
                    }
                    _ => message,
                };
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "agent_unreachable",
                    message,
                }
            }
        }
    }
}

// ============ Health & summary ============

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

async fn handle_summary(State(dash): State<AppState>) -> Json<DashboardSummary> {
    Json(dash.summary().await)
}

// ============ Knowledge base ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    paths: Vec<PathBuf>,
}

async fn handle_list_entries(State(dash): State<AppState>) -> Json<Vec<EntrySummary>> {
    Json(dash.entries().await)
}

async fn handle_ingest(
    State(dash): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<EntrySummary>), AppError> {
    let entry = dash.ingest_paths(&req.paths).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Always 204: removing an unknown id is a no-op.
async fn handle_remove_entry(State(dash): State<AppState>, Path(id): Path<String>) -> StatusCode {
    dash.remove_entry(&id).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct FileFilter {
    #[serde(default)]
    q: String,
}

async fn handle_filter_files(
    State(dash): State<AppState>,
    Query(filter): Query<FileFilter>,
) -> Json<Vec<FileListing>> {
    Json(dash.filter_files(&filter.q).await)
}

// ============ RAG sources ============

async fn handle_list_sources(State(dash): State<AppState>) -> Json<Vec<RagSource>> {
    Json(dash.rag_sources().await)
}

#[derive(Serialize)]
struct ToggleResponse {
    id: String,
    active: bool,
}

/// `null` for an unknown id: toggling it is a no-op.
async fn handle_toggle_source(
    State(dash): State<AppState>,
    Path(id): Path<String>,
) -> Json<Option<ToggleResponse>> {
    let toggled = dash.toggle_rag_source(&id).await;
    Json(toggled.map(|active| ToggleResponse { id, active }))
}

// ============ Query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    country: String,
    #[serde(default)]
    question: String,
}

async fn handle_query(
    State(dash): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AgentResult>, AppError> {
    Ok(Json(dash.ask(&req.country, &req.question).await?))
}

async fn handle_last_result(State(dash): State<AppState>) -> Json<Option<AgentResult>> {
    Json(dash.last_result().await)
}

// ============ Stakeholders ============

async fn handle_list_stakeholders(State(dash): State<AppState>) -> Json<Vec<Stakeholder>> {
    Json(dash.stakeholders().await)
}

async fn handle_add_stakeholder(
    State(dash): State<AppState>,
) -> (StatusCode, Json<Stakeholder>) {
    (StatusCode::CREATED, Json(dash.add_stakeholder().await))
}

/// `null` for an unknown id: the patch is dropped.
async fn handle_update_stakeholder(
    State(dash): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<StakeholderPatch>,
) -> Json<Option<Stakeholder>> {
    Json(dash.update_stakeholder(&id, patch).await)
}

async fn handle_remove_stakeholder(
    State(dash): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    dash.remove_stakeholder(&id).await;
    StatusCode::NO_CONTENT
}

async fn handle_generate(
    State(dash): State<AppState>,
) -> Result<Json<Vec<Stakeholder>>, AppError> {
    Ok(Json(dash.generate_stakeholders().await?))
}

async fn handle_export_csv(State(dash): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stakeholders.csv\"",
            ),
        ],
        dash.export_csv().await,
    )
}
