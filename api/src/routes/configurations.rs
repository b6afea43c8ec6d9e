//! `GET /configurations/…` — read-only access to the built-in temporal
//! (warfare-mix) catalog a generation request can select by id.
//!
//! Persisted, user-defined configurations are an external collaborator
//! (spec.md 1); this crate ships exactly one built-in preset — the same
//! default mix `medsim_job::worker` falls back to when a job's request
//! doesn't name a `configuration_id` of its own.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use medsim_common::SimError;
use medsim_job::default_temporal_config;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::ApiState;

const BUILTIN_CONFIGURATION_ID: &str = "default";

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigurationSummary {
    pub id: String,
    pub description: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/configurations/",
    responses((status = 200, description = "Known configuration ids", body = [ConfigurationSummary])),
    tag = "configurations"
)]
pub async fn list_configurations() -> impl IntoResponse {
    Json(ApiResponse::success(vec![ConfigurationSummary {
        id: BUILTIN_CONFIGURATION_ID.to_string(),
        description: "built-in five-warfare-type temporal mix".to_string(),
    }]))
}

#[utoipa::path(
    get,
    path = "/api/v1/configurations/{id}",
    params(("id" = String, Path, description = "Configuration id")),
    responses(
        (status = 200, description = "Temporal configuration, as it would be applied to a 100-patient cohort"),
        (status = 404, description = "No such configuration")
    ),
    tag = "configurations"
)]
pub async fn get_configuration(
    State(_state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if id != BUILTIN_CONFIGURATION_ID {
        return Err(ApiError(SimError::NotFound(format!("configuration {id}"))));
    }
    Ok(Json(ApiResponse::success(default_temporal_config(100))))
}
