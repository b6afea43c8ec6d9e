//! HTTP routes, one module per resource (spec.md 6).

pub mod configurations;
pub mod download;
pub mod generation;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod visualizations;
