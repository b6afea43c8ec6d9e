//! Job execution — wires a persisted [`Job`](crate::model::Job) to the
//! [`ResourceGovernor`] and the cohort [`runner`], the way the original
//! `job_worker.py` wires a `Job` row to `JobResourceManager` and the
//! generation pipeline.
//!
//! File-format writers (JSON/CSV/XML/FHIR), compression, and encryption are
//! out of scope here — they are external collaborators this crate only
//! describes via [`Job::result_manifest`], never produces bytes for.

use std::sync::Arc;

use medsim_common::{JobId, SimError, SimInstant, SimResult};
use medsim_core::temporal_pattern::{Archetype, TemporalConfig, WarfareProfile, WarfareType};
use tracing::{info, warn};

use crate::governor::ResourceGovernor;
use crate::model::{Job, JobProgressDetails, OutputFormat};
use crate::repository::JobRepository;
use crate::runner::{self, CohortRunConfig};

/// Default warfare mix used when a job's configuration blob doesn't specify
/// its own temporal pattern — five profiles spanning every [`WarfareType`],
/// one archetype each, matching the variety `temporal_pattern`'s doc
/// comments describe.
pub fn default_temporal_config(total_patients: u32) -> TemporalConfig {
    TemporalConfig {
        days: 7,
        total_patients,
        base_time: SimInstant::ZERO,
        warfare_profiles: vec![
            WarfareProfile {
                warfare_type: WarfareType::Conventional,
                weight: 0.35,
                archetype: Archetype::Sustained {
                    peak_hours: vec![8, 9, 10, 16, 17, 18],
                    peak_intensity: 1.6,
                    base_intensity: 1.0,
                    night_hours: vec![0, 1, 2, 3, 4, 5],
                    night_reduction: 0.4,
                },
                mass_casualty_probability: 0.05,
                cluster_size_range: (2, 8),
            },
            WarfareProfile {
                warfare_type: WarfareType::Artillery,
                weight: 0.25,
                archetype: Archetype::Surge {
                    preferred_hours: vec![5, 6, 18, 19],
                    num_surges: 2,
                    surge_intensity: 2.0,
                    between_surge_intensity: 0.5,
                },
                mass_casualty_probability: 0.15,
                cluster_size_range: (5, 20),
            },
            WarfareProfile {
                warfare_type: WarfareType::Drone,
                weight: 0.15,
                archetype: Archetype::PrecisionStrike {
                    strikes_per_day_range: (2, 6),
                    preferred_hours: vec![10, 11, 12, 13, 14],
                    time_randomization: 0.2,
                },
                mass_casualty_probability: 0.02,
                cluster_size_range: (1, 3),
            },
            WarfareProfile {
                warfare_type: WarfareType::Urban,
                weight: 0.15,
                archetype: Archetype::PhasedAssault {
                    phases: vec![
                        medsim_core::temporal_pattern::Phase { start_hour: 4, duration_hours: 3, intensity: 2.2 },
                        medsim_core::temporal_pattern::Phase { start_hour: 15, duration_hours: 4, intensity: 1.8 },
                    ],
                    baseline_intensity: 0.6,
                },
                mass_casualty_probability: 0.1,
                cluster_size_range: (3, 12),
            },
            WarfareProfile {
                warfare_type: WarfareType::Guerrilla,
                weight: 0.10,
                archetype: Archetype::Sporadic {
                    events_per_day_range: (1, 4),
                    dawn_dusk_hours: vec![5, 6, 19, 20],
                    dawn_dusk_preference: 0.7,
                    night_activity_level: 0.3,
                },
                mass_casualty_probability: 0.03,
                cluster_size_range: (1, 4),
            },
        ],
        daily_intensity: vec![1.0, 1.1, 0.9, 1.3, 1.0, 0.8, 1.2],
        enable_special_events: true,
        environmental_modifiers: Vec::new(),
    }
}

fn result_manifest_for(formats: &[OutputFormat]) -> Vec<String> {
    formats
        .iter()
        .map(|f| match f {
            OutputFormat::Json => "result.json".to_string(),
            OutputFormat::Csv => "result.csv".to_string(),
            OutputFormat::Xml => "result.xml".to_string(),
            OutputFormat::Fhir => "result.fhir.json".to_string(),
        })
        .collect()
}

/// Runs `job_id` to completion: marks it running, admits it past the
/// resource governor, drives [`runner::run_cohort`], and persists the final
/// status. Progress is streamed to the repository via a `tokio::sync::watch`
/// channel so `GET /jobs/{id}` reflects in-flight chunks rather than only
/// the terminal state.
pub async fn execute_job(job_id: JobId, repo: Arc<dyn JobRepository>, governor: Arc<ResourceGovernor>) -> SimResult<()> {
    let mut job = repo.get(&job_id).await.map_err(|e| SimError::NotFound(e.to_string()))?;
    job.mark_running();
    repo.update(job.clone()).await.map_err(|e| SimError::StorageError(e.to_string()))?;

    if !governor.wait_for_resources(std::time::Duration::from_secs(governor.config().max_runtime_seconds)).await {
        job.mark_failed("timed out waiting for free job capacity");
        repo.update(job.clone()).await.map_err(|e| SimError::StorageError(e.to_string()))?;
        return Err(SimError::ResourceLimitExceeded(format!("job {job_id} could not be admitted")));
    }

    let guard = governor.track(job_id.to_string()).await;

    let total_patients = job.config.total_patients.unwrap_or(100);
    let config = CohortRunConfig {
        temporal: default_temporal_config(total_patients),
        chunk_minutes: 30,
        max_sim_minutes: 14 * 24 * 60,
    };

    let initial_progress =
        JobProgressDetails { current_phase: "queued".to_string(), phase_description: "waiting to start".to_string(), phase_progress: 0, total_patients: Some(total_patients), processed_patients: Some(0) };
    let (tx, mut rx) = tokio::sync::watch::channel(initial_progress);

    let reporter_repo = repo.clone();
    let mut reporter_job = job.clone();
    let reporter = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let details = rx.borrow_and_update().clone();
            reporter_job.update_progress(details.phase_progress, details);
            if reporter_repo.update(reporter_job.clone()).await.is_err() {
                break;
            }
        }
    });

    let on_progress = move |details: JobProgressDetails| {
        let _ = tx.send(details);
    };

    let mut rng = rand::thread_rng();
    let result = runner::run_cohort(config, &guard, &mut rng, on_progress).await;
    guard.finish().await;
    reporter.abort();

    match result {
        Ok(outcome) => {
            info!(job_id = %job_id, patients = outcome.patients_generated, deaths = outcome.death_statistics.total_deaths, "cohort run completed");
            job.mark_completed(result_manifest_for(&job.config.output_formats));
            repo.update(job).await.map_err(|e| SimError::StorageError(e.to_string()))?;
            Ok(())
        }
        Err(e) => {
            // Cancellation surfaces through the same error channel as any
            // other governor trip (`JobGuard::check` returning
            // `InvalidOperation("cancelled")`); route it to the distinct
            // `Cancelled` terminal status instead of `Failed` so
            // `GET /jobs/{id}` reports the reason precisely (spec.md 3's
            // job status set carries `cancelled` as its own value, which we
            // keep instead of folding it into `failed` as section 5's prose
            // literally suggests — see DESIGN.md).
            if matches!(&e, SimError::InvalidOperation(msg) if msg == "cancelled") {
                info!(job_id = %job_id, "cohort run cancelled");
                job.mark_cancelled();
            } else {
                warn!(job_id = %job_id, error = %e, "cohort run failed");
                job.mark_failed(e.to_string());
            }
            repo.update(job).await.map_err(|e| SimError::StorageError(e.to_string()))?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::GovernorConfig;
    use crate::model::{JobConfig, JobPriority};
    use crate::repository::InMemoryJobRepository;

    fn config() -> JobConfig {
        JobConfig {
            configuration_id: None,
            configuration: None,
            total_patients: Some(6),
            output_formats: vec![OutputFormat::Json],
            use_compression: false,
            use_encryption: false,
            encryption_password: None,
            priority: JobPriority::Normal,
        }
    }

    #[tokio::test]
    async fn execute_job_marks_completed_on_success() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let governor = Arc::new(ResourceGovernor::new(GovernorConfig::default()));

        let job = Job::new(config());
        let id = job.id;
        repo.create(job).await.unwrap();

        execute_job(id, repo.clone(), governor).await.unwrap();

        let finished = repo.get(&id).await.unwrap();
        assert!(finished.status.is_terminal());
        assert!(!finished.result_manifest.is_empty());
    }
}
