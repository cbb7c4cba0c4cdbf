use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use ash_core::health::HealthSource;

/// Shared state for the Health & Metrics HTTP surface (spec §4.14).
pub struct MetricsState {
    pub health: Arc<dyn HealthSource>,
    pub prometheus: PrometheusHandle,
}

pub fn build_router(state: Arc<MetricsState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/health/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/health/detailed", get(detailed_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /health`, `/healthz` — always 200, pure liveness.
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /health/ready`, `/readyz` — 200 iff the gateway is connected and
/// every required collaborator is reachable.
async fn ready_handler(State(state): State<Arc<MetricsState>>) -> (StatusCode, Json<Value>) {
    let snapshot = state.health.snapshot().await;
    if snapshot.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready" })),
        )
    }
}

/// `GET /health/detailed` — full JSON tree of component statuses.
async fn detailed_handler(State(state): State<Arc<MetricsState>>) -> Json<Value> {
    let snapshot = state.health.snapshot().await;
    Json(json!({
        "gateway_connected": snapshot.gateway_connected,
        "ready": snapshot.is_ready(),
        "components": snapshot.components,
    }))
}

/// `GET /metrics` — Prometheus text exposition format.
async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> String {
    state.prometheus.render()
}

/// Bind and serve the Health & Metrics router until the process exits or the
/// listener fails. Runs as its own spawned task alongside the gateway
/// connection, mirroring the teacher's `axum::serve` call in `main`.
pub async fn spawn(addr: SocketAddr, state: Arc<MetricsState>) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health & metrics server listening");
    axum::serve(listener, router).await
}
