use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::metrics::encode_metrics;
use crate::queue::IngestQueue;
use crate::stats::{BridgeStats, CategorySnapshot, QueueSnapshot};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub running: bool,
    pub fast_depth: usize,
    pub slow_depth: usize,
    pub queue: QueueSnapshot,
    pub categories: Vec<CategorySnapshot>,
}

/// Shared state for the health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub queue: Arc<IngestQueue>,
    pub stats: Arc<BridgeStats>,
}

impl ServerState {
    pub fn new(queue: Arc<IngestQueue>, stats: Arc<BridgeStats>) -> Self {
        Self { queue, stats }
    }
}

/// Health endpoint - always returns 200 while the server is up
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let (fast_depth, slow_depth) = state.queue.depths();
    Json(HealthResponse {
        status: "ok".to_string(),
        running: state.queue.is_running(),
        fast_depth,
        slow_depth,
        queue: state.stats.queue_snapshot(),
        categories: state.stats.snapshot(),
    })
}

/// Ready endpoint - 200 only once the consumers are running
async fn ready(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    if state.queue.is_running() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    }
}

/// Prometheus text endpoint
async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            format!("metrics encoding failed: {e}"),
        ),
    }
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
