//! Health check endpoints
//!
//! `/health` always answers while the process runs, `/ready` only once the
//! lifecycle reached `Ready`, `/commands` only once reconciliation populated
//! the registry.

use crate::commands::CommandRegistry;
use crate::lifecycle::{Gateway, GatewayMode, LifecycleState};
use crate::metrics::GatewayMetrics;
use crate::shard::ShardState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: GatewayMode,
    pub state: LifecycleState,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub state: LifecycleState,
    pub mode: GatewayMode,
    pub shards_total: u32,
    pub shards_running: u32,
    pub shards_ready: usize,
    pub guilds_total: u64,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application state for health endpoints
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn Gateway>,
    pub shard_state: ShardState,
    pub registry: Arc<CommandRegistry>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/commands", get(commands_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.gateway.mode(),
        state: state.gateway.state(),
    })
}

/// Readiness endpoint - returns 200 only once startup completed
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let lifecycle = state.gateway.state();
    let is_ready = lifecycle == LifecycleState::Ready;

    let response = ReadyResponse {
        ready: is_ready,
        state: lifecycle,
        mode: state.gateway.mode(),
        shards_total: state.gateway.shards_total(),
        shards_running: state.gateway.shards_running(),
        shards_ready: state.shard_state.ready_shards(),
        guilds_total: state.shard_state.total_guilds(),
        latency_ms: state
            .gateway
            .gateway_latency()
            .map(|latency| latency.as_millis() as u64),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.set_shards(
        state.shard_state.running_shards(),
        state.shard_state.ready_shards(),
    );

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}

/// Commands endpoint - the reconciled command set, 503 until populated
async fn commands_handler(State(state): State<AppState>) -> Response {
    match state.registry.commands() {
        Ok(commands) => (StatusCode::OK, Json(commands.to_vec())).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
