//! `GET /visualizations/…` — the data points a dashboard would chart for a
//! given job. The dashboard itself (and any rendering) is an external
//! collaborator (spec.md 1); this endpoint only ever returns the numbers
//! already tracked on the job record.

use axum::{
    extract::{Path, State},
    Json,
};
use medsim_common::SimError;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::ApiState;

#[derive(Debug, Serialize, ToSchema)]
pub struct VisualizationData {
    pub job_id: String,
    #[schema(value_type = String)]
    pub status: medsim_job::JobStatus,
    pub progress: u8,
    pub processed_patients: Option<u32>,
    pub total_patients: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/visualizations/{job_id}",
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Chartable progress data for the job", body = VisualizationData),
        (status = 404, description = "No such job")
    ),
    tag = "visualizations"
)]
pub async fn get_job_visualization(
    State(state): State<Arc<ApiState>>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<VisualizationData>>, ApiError> {
    let id = medsim_common::JobId::from_str(&job_id).map_err(|_| ApiError(SimError::InvalidInput(format!("malformed job id: {job_id}"))))?;
    let job = state.job_repo.get(&id).await.map_err(|_| ApiError(SimError::NotFound(format!("job {id}"))))?;

    let details = job.progress_details.as_ref();
    Ok(Json(ApiResponse::success(VisualizationData {
        job_id: job.id.to_string(),
        status: job.status,
        progress: job.progress,
        processed_patients: details.and_then(|d| d.processed_patients),
        total_patients: job.config.total_patients,
    })))
}
