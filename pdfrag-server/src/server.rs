use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use pdfrag::{IndexReport, Passage, RagSession, SessionState, SourceDocument};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::error::ApiError;

/// Largest accepted upload request, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RagSession>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(session: Arc<RagSession>) -> Self {
        Self { session, max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Listener settings, read from the `[server]` table of `pdfrag.toml` or
/// `PDFRAG_SERVER__*` variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_figment(figment: &figment::Figment) -> Result<Self, figment::Error> {
        figment.focus("server").extract()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answers: Vec<String>,
    pub passages: Vec<Passage>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: SessionState,
    pub entries: usize,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/documents", post(upload_documents))
        .route("/api/query", post(query))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state.with_max_upload_bytes(config.max_upload_bytes));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for pdfrag server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("pdfrag listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../ui/index.html"))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"pdfrag-server"}))
}

async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IndexReport>, ApiError> {
    let mut sources = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        sources.push(SourceDocument::new(name, bytes.to_vec()));
    }

    if sources.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".to_string()));
    }

    info!(file_count = sources.len(), "rebuilding index from upload");
    let report = state.session.index(sources).await?;
    Ok(Json(report))
}

async fn query(
    State(state): State<AppState>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query cannot be empty".to_string()));
    }

    let passages = state.session.query_passages(&request.query, request.k).await?;
    let answers = passages.iter().map(|p| p.text.clone()).collect();
    Ok(Json(QueryResponse { answers, passages }))
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(StatusResponse {
        state: state.session.state().await,
        entries: state.session.entry_count().await?,
    }))
}
