//! API routes for Dissent endpoints

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;

use dissent_core::DebateRequest;
use dissent_runtime::DebateTranscript;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::ws;

/// Health check response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Basic health check", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.orchestrator().model().to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Debate request as accepted over HTTP and WebSocket
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct DebatePayload {
    /// One to four document texts
    pub documents: Vec<String>,
    pub query: String,
    /// Debate rounds, 1 to 4
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Snippets retrieved per document
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Completion model override
    #[serde(default)]
    pub model: Option<String>,
}

impl From<DebatePayload> for DebateRequest {
    fn from(payload: DebatePayload) -> Self {
        let mut request = DebateRequest::new(payload.documents, payload.query);
        if let Some(rounds) = payload.rounds {
            request = request.with_rounds(rounds);
        }
        if let Some(top_k) = payload.top_k {
            request = request.with_top_k(top_k);
        }
        request.model = payload.model;
        request
    }
}

/// Run a debate to completion
#[utoipa::path(
    post,
    path = "/api/debate",
    request_body = DebatePayload,
    responses(
        (status = 200, description = "Finished debate: query, steps, final_answer and stats"),
        (status = 400, description = "Invalid input"),
        (status = 503, description = "Every debater failed or retrieval was unavailable")
    )
)]
pub async fn run_debate(
    State(state): State<AppState>,
    Json(payload): Json<DebatePayload>,
) -> ApiResult<Json<DebateTranscript>> {
    let (orchestrator, request) = state.prepare(payload.into()).await?;
    let transcript = orchestrator.run_to_completion(&request).await?;
    Ok(Json(transcript))
}

/// Metrics response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub llm_calls: u64,
    pub llm_errors: u64,
    pub tokens_used: u64,
    pub debates: u64,
    pub debates_failed: u64,
    pub rounds: u64,
    pub degraded_responses: u64,
    pub cancelled: u64,
    pub error_rate: f64,
}

/// Get metrics handler
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Current debate and provider metrics", body = MetricsResponse)
    )
)]
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let metrics = state.metrics();
    let snapshot = metrics.snapshot();

    Json(MetricsResponse {
        llm_calls: snapshot.llm_calls,
        llm_errors: snapshot.llm_errors,
        tokens_used: snapshot.tokens_used,
        debates: snapshot.debates,
        debates_failed: snapshot.debates_failed,
        rounds: snapshot.rounds,
        degraded_responses: snapshot.degraded_responses,
        cancelled: snapshot.cancelled,
        error_rate: metrics.llm_error_rate(),
    })
}

/// Prometheus metrics handler
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus formatted metrics", body = String)
    )
)]
pub async fn get_prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics().snapshot().to_prometheus(),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        run_debate,
        get_metrics,
        get_prometheus_metrics,
        crate::ws::debate_ws,
    ),
    components(schemas(HealthResponse, DebatePayload, MetricsResponse))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Documentation
        .route("/api-docs/openapi.json", get(openapi_json))
        // Public endpoints
        .route("/health", get(health))
        .route("/api/debate", post(run_debate))
        .route("/ws/debate", get(ws::debate_ws))
        // Observability
        .route("/api/metrics", get(get_metrics))
        .route("/metrics", get(get_prometheus_metrics))
        .with_state(state)
}
