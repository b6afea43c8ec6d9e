//! `GET /metrics` — Prometheus text exposition.
//!
//! A full metrics registry (histograms, per-route latency, etc.) is the
//! Prometheus-exporter external collaborator spec.md 1 places out of scope;
//! this handler formats the counters this crate already tracks (job counts
//! by status, active governor slots) in the exposition text format, the
//! shape a real registry's `/metrics` scrape would also produce.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    extract::State,
};
use std::sync::Arc;

use crate::ApiState;

fn render(
    jobs_by_status: &std::collections::HashMap<&'static str, usize>,
    active_jobs: usize,
    max_concurrent_jobs: usize,
) -> String {
    let mut out = String::new();
    out.push_str("# HELP medsim_jobs_total Jobs by terminal/non-terminal status\n");
    out.push_str("# TYPE medsim_jobs_total gauge\n");
    for (status, count) in jobs_by_status {
        out.push_str(&format!("medsim_jobs_total{{status=\"{status}\"}} {count}\n"));
    }
    out.push_str("# HELP medsim_active_jobs Jobs currently tracked by the resource governor\n");
    out.push_str("# TYPE medsim_active_jobs gauge\n");
    out.push_str(&format!("medsim_active_jobs {active_jobs}\n"));
    out.push_str("# HELP medsim_max_concurrent_jobs Configured concurrency cap\n");
    out.push_str("# TYPE medsim_max_concurrent_jobs gauge\n");
    out.push_str(&format!("medsim_max_concurrent_jobs {max_concurrent_jobs}\n"));
    out
}

#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, description = "Prometheus text exposition")),
    tag = "health"
)]
pub async fn metrics(State(state): State<Arc<ApiState>>) -> Response {
    let jobs = state.job_repo.list().await.unwrap_or_default();
    let mut by_status: std::collections::HashMap<&'static str, usize> = std::collections::HashMap::new();
    for job in &jobs {
        let key = match job.status {
            medsim_job::JobStatus::Pending => "pending",
            medsim_job::JobStatus::Queued => "queued",
            medsim_job::JobStatus::Running => "running",
            medsim_job::JobStatus::Completed => "completed",
            medsim_job::JobStatus::Failed => "failed",
            medsim_job::JobStatus::Cancelled => "cancelled",
        };
        *by_status.entry(key).or_insert(0) += 1;
    }
    let active = state.governor.active_job_count().await;
    let body = render(&by_status, active, state.config.governor.max_concurrent_jobs);

    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_counter() {
        let mut by_status = std::collections::HashMap::new();
        by_status.insert("completed", 3usize);
        let text = render(&by_status, 1, 2);
        assert!(text.contains("medsim_jobs_total{status=\"completed\"} 3"));
        assert!(text.contains("medsim_active_jobs 1"));
        assert!(text.contains("medsim_max_concurrent_jobs 2"));
    }
}
