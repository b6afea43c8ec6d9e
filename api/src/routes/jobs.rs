//! `GET /jobs/`, `GET /jobs/{id}`, `GET /jobs/{id}/results`, `DELETE /jobs/{id}`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use medsim_common::{JobId, SimError};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{ApiResponse, JobListResponse, JobResponse};
use crate::ApiState;

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::from_str(raw).map_err(|_| ApiError(SimError::InvalidInput(format!("malformed job id: {raw}"))))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/",
    responses((status = 200, description = "All known jobs", body = JobListResponse)),
    tag = "jobs"
)]
pub async fn list_jobs(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.job_repo.list().await.map_err(|e| ApiError(SimError::StorageError(e.to_string())))?;
    let items: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
    let total = items.len();
    Ok(Json(ApiResponse::success(JobListResponse { items, total })))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status", body = JobResponse),
        (status = 404, description = "No such job")
    ),
    tag = "jobs"
)]
pub async fn get_job(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_repo.get(&job_id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {job_id}"))))?;
    Ok(Json(ApiResponse::success(JobResponse::from(job))))
}

/// Results are limited to the manifest of output file paths (spec.md 3's
/// `Job.result_manifest`) plus progress detail; the files themselves are
/// produced by the output-writer external collaborator, out of scope here
/// (spec.md 1).
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/results",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Result manifest", body = JobResponse),
        (status = 400, description = "Job has not completed"),
        (status = 404, description = "No such job")
    ),
    tag = "jobs"
)]
pub async fn get_job_results(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_repo.get(&job_id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {job_id}"))))?;
    if job.status != medsim_job::JobStatus::Completed {
        return Err(ApiError(SimError::InvalidOperation(format!("job {job_id} has not completed (status: {:?})", job.status))));
    }
    Ok(Json(ApiResponse::success(JobResponse::from(job))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job cancelled", body = JobResponse),
        (status = 400, description = "Job already terminal"),
        (status = 404, description = "No such job")
    ),
    tag = "jobs"
)]
pub async fn cancel_job(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&id)?;
    let mut job = state.job_repo.get(&job_id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {job_id}"))))?;

    if job.status.is_terminal() {
        return Err(ApiError(SimError::InvalidOperation(format!("job {job_id} is already {:?}", job.status))));
    }

    // If a cohort is already running, the governor's cancel flag is the
    // only way to reach it; the worker observes it at its next chunk
    // boundary and marks the job Cancelled itself (spec.md 5). If the job
    // hasn't started yet, there's nothing for the governor to signal, so
    // cancel it directly here.
    if !state.governor.cancel(&job_id.to_string()).await {
        job.mark_cancelled();
        state.job_repo.update(job.clone()).await.map_err(|e| ApiError(SimError::StorageError(e.to_string())))?;
    }

    let refreshed = state.job_repo.get(&job_id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {job_id}"))))?;
    Ok((StatusCode::OK, Json(ApiResponse::success(JobResponse::from(refreshed)))))
}
