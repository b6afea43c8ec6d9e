//! `POST /generation/` — submit a cohort-generation job (spec.md 6).
//!
//! Validates the request body against the spec's exactly-one-of and
//! encryption-password constraints and persists a [`medsim_job::Job`] in the
//! `Pending` state. The actual generation work (and any file-format
//! writing) happens off the request path, picked up by the process's
//! [`medsim_job::JobWorkerPool`] in priority order; this handler only ever
//! returns once the job is durably queued.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use medsim_common::SimError;
use medsim_job::model::{Job, JobConfig};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{ApiResponse, GenerationRequest, GenerationResponse};
use crate::ApiState;

fn validate(req: &GenerationRequest, max_patients_per_job: u32) -> Result<(), SimError> {
    let has_id = req.configuration_id.is_some();
    let has_inline = req.configuration.is_some();
    if has_id == has_inline {
        return Err(SimError::InvalidInput(
            "exactly one of configuration_id or configuration must be present".to_string(),
        ));
    }
    if req.use_encryption && req.encryption_password.is_none() {
        return Err(SimError::InvalidInput("encryption_password is required when use_encryption is set".to_string()));
    }
    if let Some(total) = req.total_patients {
        if total == 0 {
            return Err(SimError::InvalidInput("total_patients must be at least 1".to_string()));
        }
        if total > max_patients_per_job {
            return Err(SimError::InvalidInput(format!("total_patients exceeds the configured maximum of {max_patients_per_job}")));
        }
    }
    Ok(())
}

/// Rough linear estimate (patients generated per simulated-second of wall
/// clock, based on the chunked-advance loop in `medsim_job::runner`) purely
/// to populate `estimated_duration_seconds`; not a scheduling guarantee.
fn estimate_duration_seconds(total_patients: u32) -> u64 {
    (total_patients as u64 / 50).max(5)
}

#[utoipa::path(
    post,
    path = "/api/v1/generation/",
    request_body = GenerationRequest,
    responses(
        (status = 201, description = "Job accepted", body = GenerationResponse),
        (status = 422, description = "Validation error")
    ),
    tag = "generation"
)]
pub async fn submit_generation(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<GenerationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req, state.config.max_patients_per_job).map_err(ApiError)?;

    let total_patients = req.total_patients.unwrap_or(100);
    let job_config = JobConfig {
        configuration_id: req.configuration_id,
        configuration: req.configuration,
        total_patients: Some(total_patients),
        output_formats: req.output_formats,
        use_compression: req.use_compression,
        use_encryption: req.use_encryption,
        encryption_password: req.encryption_password,
        priority: req.priority,
    };

    let job = Job::new(job_config);
    let job_id = job.id;

    state.job_repo.create(job).await.map_err(|e| ApiError(SimError::StorageError(e.to_string())))?;

    let response = GenerationResponse {
        job_id: job_id.to_string(),
        status: medsim_job::model::JobStatus::Pending,
        message: "job accepted".to_string(),
        estimated_duration_seconds: estimate_duration_seconds(total_patients),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsim_job::model::{JobPriority, OutputFormat};

    fn base_request() -> GenerationRequest {
        GenerationRequest {
            configuration_id: Some("default".to_string()),
            configuration: None,
            output_formats: vec![OutputFormat::Json],
            use_compression: false,
            use_encryption: false,
            encryption_password: None,
            priority: JobPriority::Normal,
            total_patients: Some(100),
        }
    }

    #[test]
    fn rejects_when_neither_configuration_field_is_set() {
        let mut req = base_request();
        req.configuration_id = None;
        assert!(validate(&req, 10_000).is_err());
    }

    #[test]
    fn rejects_when_both_configuration_fields_are_set() {
        let mut req = base_request();
        req.configuration = Some(serde_json::json!({}));
        assert!(validate(&req, 10_000).is_err());
    }

    #[test]
    fn rejects_encryption_without_password() {
        let mut req = base_request();
        req.use_encryption = true;
        assert!(validate(&req, 10_000).is_err());
    }

    #[test]
    fn accepts_encryption_with_password() {
        let mut req = base_request();
        req.use_encryption = true;
        req.encryption_password = Some("hunter2".to_string());
        assert!(validate(&req, 10_000).is_ok());
    }

    #[test]
    fn rejects_total_patients_over_the_configured_cap() {
        let mut req = base_request();
        req.total_patients = Some(20_000);
        assert!(validate(&req, 10_000).is_err());
    }
}
