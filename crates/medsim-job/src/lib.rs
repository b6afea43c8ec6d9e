//! Background job runner for cohort generation (C14).
//!
//! A [`model::Job`] is a persisted record of one cohort-generation request;
//! [`runner::run_cohort`] is the actual simulation loop a worker drives
//! against an [`medsim_core::orchestrator::Orchestrator`], bounded by
//! [`governor::ResourceGovernor`]'s concurrency and memory caps.

pub mod governor;
pub mod model;
pub mod pool;
pub mod repository;
pub mod runner;
pub mod worker;

pub use governor::{GovernorConfig, JobGuard, ResourceGovernor};
pub use model::{Job, JobConfig, JobPriority, JobProgressDetails, JobStatus, OutputFormat};
pub use pool::JobWorkerPool;
pub use repository::{InMemoryJobRepository, JobRepository, RepoResult, RepositoryError};
pub use runner::{run_cohort, CohortRunConfig, CohortRunOutcome};
pub use worker::default_temporal_config;
