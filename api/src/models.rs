//! Request/response schemas for the generation HTTP surface: a generic
//! `ApiResponse<T>`/`ErrorResponse` envelope plus one request/response pair
//! per resource, all deriving `utoipa::ToSchema` for the OpenAPI document.

use medsim_job::{Job, JobPriority, JobStatus, OutputFormat};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// `POST /generation/` body. Exactly one of `configuration_id`/`configuration`
/// must be present; `encryption_password` is required iff `use_encryption`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerationRequest {
    pub configuration_id: Option<String>,
    pub configuration: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub output_formats: Vec<OutputFormat>,
    #[serde(default)]
    pub use_compression: bool,
    #[serde(default)]
    pub use_encryption: bool,
    pub encryption_password: Option<String>,
    #[serde(default)]
    #[schema(value_type = String)]
    pub priority: JobPriority,
    pub total_patients: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationResponse {
    pub job_id: String,
    #[schema(value_type = String)]
    pub status: JobStatus,
    pub message: String,
    pub estimated_duration_seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: String,
    #[schema(value_type = String)]
    pub status: JobStatus,
    pub progress: u8,
    pub current_phase: Option<String>,
    pub processed_patients: Option<u32>,
    pub total_patients: Option<u32>,
    pub error: Option<String>,
    pub result_manifest: Vec<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            status: job.status,
            progress: job.progress,
            current_phase: job.progress_details.as_ref().map(|d| d.current_phase.clone()),
            processed_patients: job.progress_details.as_ref().and_then(|d| d.processed_patients),
            total_patients: job.config.total_patients,
            error: job.error,
            result_manifest: job.result_manifest,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub items: Vec<JobResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    pub ready: bool,
    pub active_jobs: usize,
}
