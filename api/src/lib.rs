//! HTTP surface for the medical evacuation simulation engine (spec.md 6).
//!
//! An `ApiState` holds the process-wide singletons (the job repository and
//! resource governor), alongside a `utoipa::OpenApi` document and one
//! `routes::*` module per resource, each exposing a `Router<Arc<ApiState>>`
//! merged under `/api/v1`. Auth is a static `X-API-Key` header comparison
//! rather than JWT — see `middleware::auth`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use medsim_job::{InMemoryJobRepository, JobRepository, JobWorkerPool, ResourceGovernor};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use config::AppConfig;

/// Process-wide state shared by every handler. The job store, resource
/// governor, and worker pool are the only process-global singletons this
/// crate carries (SPEC_FULL.md section B, "Singletons" design note);
/// everything else is constructed fresh per request.
pub struct ApiState {
    pub config: AppConfig,
    pub job_repo: Arc<dyn JobRepository>,
    pub governor: Arc<ResourceGovernor>,
    pub worker_pool: JobWorkerPool,
}

impl ApiState {
    /// Builds the singletons and starts the worker pool; `routes::generation`
    /// only ever persists a `Pending` job, the pool is what actually runs it.
    pub fn new(config: AppConfig) -> Self {
        let governor = Arc::new(ResourceGovernor::new(config.governor));
        let job_repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let worker_pool = JobWorkerPool::new(job_repo.clone(), governor.clone(), config.job_worker_pool_size);
        worker_pool.start();
        Self { config, job_repo, governor, worker_pool }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medical Evacuation Simulation Engine API",
        version = "1.0.0",
        description = "Generates synthetic casualty cohorts and drives them through a multi-echelon medical evacuation chain.",
        license(name = "Apache-2.0")
    ),
    paths(
        routes::health::health_check,
        routes::health::readiness_check,
        routes::generation::submit_generation,
        routes::jobs::list_jobs,
        routes::jobs::get_job,
        routes::jobs::get_job_results,
        routes::jobs::cancel_job,
        routes::download::download_job_results,
        routes::configurations::list_configurations,
        routes::configurations::get_configuration,
        routes::visualizations::get_job_visualization,
        routes::metrics::metrics,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::GenerationRequest,
            models::GenerationResponse,
            models::JobResponse,
            models::JobListResponse,
            models::HealthResponse,
            models::ReadyResponse,
            routes::configurations::ConfigurationSummary,
            routes::visualizations::VisualizationData
        )
    ),
    tags(
        (name = "health", description = "Liveness, readiness, and metrics"),
        (name = "generation", description = "Cohort generation job submission"),
        (name = "jobs", description = "Job status, results, and cancellation"),
        (name = "configurations", description = "Built-in temporal-pattern configurations"),
        (name = "visualizations", description = "Chartable per-job progress data")
    )
)]
pub struct ApiDoc;

fn api_v1_routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/generation/", axum::routing::post(routes::generation::submit_generation))
        .route("/jobs/", get(routes::jobs::list_jobs))
        .route("/jobs/:id", get(routes::jobs::get_job).delete(routes::jobs::cancel_job))
        .route("/jobs/:id/results", get(routes::jobs::get_job_results))
        .route("/download/:job_id", get(routes::download::download_job_results))
        .route("/configurations/", get(routes::configurations::list_configurations))
        .route("/configurations/:id", get(routes::configurations::get_configuration))
        .route("/visualizations/:job_id", get(routes::visualizations::get_job_visualization))
}

/// Builds the full router: Swagger UI, health/ready/metrics (unauthenticated,
/// for load-balancer probes and scrapers), and the `X-API-Key`-gated
/// `/api/v1` surface.
pub fn build_router(state: Arc<ApiState>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<axum::http::HeaderValue> = state.config.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    };

    let authenticated_v1 = api_v1_routes().layer(from_fn_with_state(state.clone(), middleware::auth::require_api_key));

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health::health_check))
        .route("/ready", get(routes::health::readiness_check))
        .route("/metrics", get(routes::metrics::metrics))
        .nest("/api/v1", authenticated_v1)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
