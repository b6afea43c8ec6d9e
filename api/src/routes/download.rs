//! `GET /download/{job_id}` — streams a ZIP of result files.
//!
//! File-format writers, compression, and encryption are external
//! collaborators this crate never produces bytes for (spec.md 1, "Out of
//! scope"); this handler validates the job is in a downloadable state and
//! reports a storage error rather than fabricating archive bytes — once an
//! output-writer collaborator is wired in, it streams the ZIP built from
//! `job.result_manifest` from this same point.

use axum::extract::{Path, State};
use medsim_common::{JobId, SimError};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::ApiState;

#[utoipa::path(
    get,
    path = "/api/v1/download/{job_id}",
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "ZIP archive of result files"),
        (status = 400, description = "Job has no downloadable results"),
        (status = 404, description = "No such job")
    ),
    tag = "jobs"
)]
pub async fn download_job_results(State(state): State<Arc<ApiState>>, Path(job_id): Path<String>) -> Result<(), ApiError> {
    let id = JobId::from_str(&job_id).map_err(|_| ApiError(SimError::InvalidInput(format!("malformed job id: {job_id}"))))?;
    let job = state.job_repo.get(&id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {id}"))))?;

    if job.status != medsim_job::JobStatus::Completed {
        return Err(ApiError(SimError::InvalidOperation(format!("job {id} has no downloadable results (status: {:?})", job.status))));
    }
    if job.result_manifest.is_empty() {
        return Err(ApiError(SimError::StorageError(format!("job {id} completed with no output files recorded"))));
    }

    Err(ApiError(SimError::StorageError(
        "archive assembly is handled by the output-writer service, not the simulation engine".to_string(),
    )))
}
