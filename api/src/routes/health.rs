//! `GET /health`, `GET /ready` — liveness and readiness probes.
//!
//! Readiness additionally reports the active-job count from the
//! [`medsim_job::ResourceGovernor`] so an orchestration layer can tell
//! "alive" apart from "accepting new jobs".

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::models::{HealthResponse, ReadyResponse};
use crate::ApiState;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/ready",
    responses((status = 200, description = "Service is ready to accept jobs", body = ReadyResponse)),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let active_jobs = state.governor.active_job_count().await;
    Json(ReadyResponse { ready: true, active_jobs })
}
