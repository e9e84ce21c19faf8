//! Health Routes
//!
//! - GET /health/live - Liveness check (process is alive)
//! - GET /health - Hub status

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::hub::Hub;

/// Response body for `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `running` once the broadcast loop is up, `idle` before
    pub status: String,
    pub version: String,
    pub connections: usize,
    pub processors: Vec<String>,
    pub broadcast_send_failures: u64,
}

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
pub async fn full_health(State(hub): State<Hub>) -> Json<HealthResponse> {
    let stats = hub.stats().await;

    Json(HealthResponse {
        status: if stats.running { "running" } else { "idle" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: stats.connections,
        processors: hub.processor_types(),
        broadcast_send_failures: stats.broadcast_send_failures,
    })
}
