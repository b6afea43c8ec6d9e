//! Cohort runner (C14's "wraps the whole run, in chunks") — drives a full
//! cohort from a generated casualty-event timeline through the orchestrator
//! to completion.
//!
//! Grounded on `src/core/job_worker.py`'s `_execute_batched_generation` /
//! `_process_single_batch`: the event stream is walked in timestamp order,
//! materializing and processing patients as their casualty event fires, then
//! the logical clock is advanced in fixed chunks so survivors deteriorate
//! between events exactly as spec.md 2's data-flow paragraph describes:
//! "temporal generator emits casualty events, orchestrator materializes
//! patients... clock advances, deteriorates survivors... loop until cohort
//! complete."

use std::collections::HashMap;

use medsim_common::{FacilityId, PatientId, SimDuration, SimInstant, SimResult};
use medsim_core::deterioration;
use medsim_core::diagnostic_uncertainty::{DiagnosticFacility, DiagnosticUncertaintyEngine};
use medsim_core::facility::{Facility, FacilityManager, FacilityType};
use medsim_core::orchestrator::{Orchestrator, SystemStatus};
use medsim_core::overflow::FacilityDirectory;
use medsim_core::patient::{InjuryType, SeverityBand};
use medsim_core::temporal_pattern::{generate_timeline, CasualtyEvent, TemporalConfig};
use medsim_core::transport::TransportScheduler;
use medsim_core::treatment_protocols::{self, FacilityLevel};
use medsim_core::treatment_utility::{self, TreatmentCandidate};
use medsim_core::csu::CsuBatchCoordinator;
use medsim_core::death_tracker::DeathStatistics;
use rand::Rng;

use crate::governor::JobGuard;
use crate::model::JobProgressDetails;

/// Condition codes cycled over when a casualty event carries no
/// patient-level diagnosis of its own — `temporal_pattern` only emits
/// per-event counts, not per-patient clinical detail (spec.md 4.12's scope).
const CONDITION_POOL: &[&str] = &[
    "traumatic_amputation",
    "tension_pneumothorax",
    "arterial_hemorrhage",
    "penetrating_abdominal_trauma",
    "traumatic_brain_injury",
    "combat_stress_reaction",
    "dehydration",
    "closed_fracture",
];

/// Minutes a vehicle leg from Role1/Role2 up to Role3 is assumed to take
/// when a critical patient is escalated past the facility overflow router's
/// own recommendation (spec.md 4.8's transport leg, driven explicitly here
/// rather than through `overflow::route_patient`, which never reaches Role3
/// directly from Role1).
const ESCALATION_TRANSPORT_MINUTES: u64 = 30;

pub struct CohortRunConfig {
    pub temporal: TemporalConfig,
    /// Simulated minutes advanced between deterioration passes.
    pub chunk_minutes: u64,
    /// Hard ceiling on simulated time, independent of the resource
    /// governor's wall-clock runtime cap — guards against a cohort that
    /// never reaches all-terminal (e.g. patients parked `InQueue` forever).
    pub max_sim_minutes: u64,
}

pub struct CohortRunOutcome {
    pub status: SystemStatus,
    pub death_statistics: DeathStatistics,
    pub patients_generated: u32,
}

struct PendingEscalation {
    patient_id: PatientId,
    ready_at: SimInstant,
}

fn facility_level_of(facility_type: FacilityType) -> FacilityLevel {
    match facility_type {
        FacilityType::Role1 => FacilityLevel::Role1,
        FacilityType::Role2 => FacilityLevel::Role2,
        FacilityType::Role3 => FacilityLevel::Role3,
        FacilityType::Csu => FacilityLevel::Csu,
    }
}

fn diagnostic_facility_of(facility_type: FacilityType) -> DiagnosticFacility {
    match facility_type {
        FacilityType::Role1 => DiagnosticFacility::Role1,
        FacilityType::Role2 => DiagnosticFacility::Role2,
        FacilityType::Role3 => DiagnosticFacility::Role3,
        FacilityType::Csu => DiagnosticFacility::Role2,
    }
}

fn facility_name(facility_type: FacilityType) -> &'static str {
    match facility_type {
        FacilityType::Role1 => "role1",
        FacilityType::Role2 => "role2",
        FacilityType::Role3 => "role3",
        FacilityType::Csu => "csu",
    }
}

/// Builds the fixed facility set (one instance per echelon, per spec.md 3)
/// with a flat ground-transport time table between every pair.
fn build_orchestrator() -> (Orchestrator, FacilityDirectory) {
    let manager = FacilityManager::new();
    let mut directory = FacilityDirectory::new();
    for facility_type in [FacilityType::Role1, FacilityType::Role2, FacilityType::Role3, FacilityType::Csu] {
        let id = FacilityId::new(facility_name(facility_type));
        manager.register(Facility::new(id.clone(), facility_type));
        directory.insert(facility_type, id);
    }

    let mut routes = HashMap::new();
    for a in ["poi", "role1", "role2", "role3", "csu"] {
        for b in ["poi", "role1", "role2", "role3", "csu"] {
            if a != b {
                routes.insert((a.to_string(), b.to_string()), 20.0);
            }
        }
    }
    let transport = TransportScheduler::new(routes);
    let csu_id = directory.get(&FacilityType::Csu).cloned().expect("csu registered above");
    let csu = CsuBatchCoordinator::new(csu_id);

    let orchestrator = Orchestrator::new(manager, directory.clone(), transport, csu);
    (orchestrator, directory)
}

/// Samples an injury profile for one casualty. Battle injuries dominate
/// (spec.md 3's primary case); mass-casualty events are battle-only, mirroring
/// how a single kinetic strike rarely also produces disease casualties.
fn sample_injury(event: &CasualtyEvent, rng: &mut impl Rng) -> (InjuryType, u8) {
    let severity = rng.gen_range(1..=10u8);
    let injury_type = if event.is_mass_casualty {
        InjuryType::Battle
    } else {
        match rng.gen_range(0..100u32) {
            0..=69 => InjuryType::Battle,
            70..=89 => InjuryType::NonBattle,
            _ => InjuryType::Disease,
        }
    };
    (injury_type, severity)
}

fn build_candidates(treatments: &[String], severity: u8, elapsed_minutes: f64) -> Vec<TreatmentCandidate> {
    treatments
        .iter()
        .map(|name| {
            let is_critical = matches!(name.as_str(), "tourniquet" | "major_surgery" | "damage_control_surgery" | "blood_transfusion");
            TreatmentCandidate {
                name: name.clone(),
                appropriateness: treatment_utility::appropriateness_lookup(&[], "", name, false),
                urgency: treatment_utility::urgency(is_critical, 0.05, elapsed_minutes),
                effectiveness: treatment_utility::effectiveness(0.7, is_critical, severity),
                availability: 1.0,
                capability: 1.0,
            }
        })
        .collect()
}

/// Materializes, triages, diagnoses, and treats every patient in one
/// casualty event, then returns the ids now resident at the CSU so the
/// caller can feed them into the batch coordinator.
fn process_event(
    orchestrator: &mut Orchestrator,
    directory: &FacilityDirectory,
    diagnostics: &DiagnosticUncertaintyEngine,
    catalog: &[treatment_protocols::ProtocolEntry],
    event: &CasualtyEvent,
    patient_seq: &mut u64,
    pending_escalations: &mut Vec<PendingEscalation>,
    rng: &mut impl Rng,
) -> SimResult<Vec<PatientId>> {
    let mut csu_residents = Vec::new();

    for _ in 0..event.patient_count {
        *patient_seq += 1;
        let id = PatientId::new(format!("p-{}-{}", event.timestamp.as_minutes(), patient_seq));
        let (injury_type, severity) = sample_injury(event, rng);
        let condition_code = CONDITION_POOL[(*patient_seq as usize) % CONDITION_POOL.len()].to_string();

        orchestrator.initialize_patient(id.clone(), injury_type, severity, Some(condition_code.clone()), None, rng);
        let (category, facility_type) = orchestrator.process_triage(&id, event.is_mass_casualty)?;

        let facility_id = directory.get(&facility_type).cloned().unwrap_or_else(|| FacilityId::new(facility_name(facility_type)));
        let diag_outcome = diagnostics.diagnose_condition(&condition_code, diagnostic_facility_of(facility_type), category.priority(), &[], 0.0, rng);
        orchestrator.apply_diagnosis(&id, facility_id, diag_outcome)?;

        let band = SeverityBand::from_ordinal(severity);
        let treatments = treatment_protocols::get_appropriate(catalog, &condition_code, facility_level_of(facility_type), severity, 0.0, None);
        if !treatments.is_empty() {
            let candidates = build_candidates(&treatments, severity, 0.0);
            let fallback = vec![treatments[0].clone()];
            let chosen = treatment_utility::select_treatments(&candidates, 2, &fallback, rng);
            orchestrator.apply_treatment(&id, &chosen)?;
        }

        if matches!(band, SeverityBand::Critical) && facility_type != FacilityType::Role3 {
            let origin = facility_name(facility_type);
            if orchestrator.transport(&id, origin, "role3")?.is_some() {
                pending_escalations.push(PendingEscalation {
                    patient_id: id.clone(),
                    ready_at: orchestrator.simulation_time() + SimDuration::minutes(ESCALATION_TRANSPORT_MINUTES),
                });
            }
        } else if facility_type == FacilityType::Csu {
            csu_residents.push(id.clone());
        }
    }

    Ok(csu_residents)
}

fn complete_due_escalations(orchestrator: &mut Orchestrator, pending: &mut Vec<PendingEscalation>) -> SimResult<()> {
    let now = orchestrator.simulation_time();
    let mut remaining = Vec::with_capacity(pending.len());
    for item in pending.drain(..) {
        if item.ready_at > now {
            remaining.push(item);
            continue;
        }
        let died_in_transit = orchestrator.patient(&item.patient_id).map(|p| p.is_dead()).unwrap_or(true);
        orchestrator.complete_transport(&item.patient_id, died_in_transit)?;
    }
    *pending = remaining;
    Ok(())
}

/// Runs one cohort end to end: generates the event stream, processes every
/// casualty as its event fires, and advances the clock in `chunk_minutes`
/// steps (deteriorating survivors with their own per-patient rate, since
/// `Orchestrator::advance_time` only accepts a single rate for the whole
/// tick) until every patient is terminal or `max_sim_minutes` is reached.
/// `guard.check()` and the cancellation flag are polled once per chunk.
pub async fn run_cohort(
    config: CohortRunConfig,
    guard: &JobGuard<'_>,
    rng: &mut impl Rng,
    mut on_progress: impl FnMut(JobProgressDetails),
) -> SimResult<CohortRunOutcome> {
    let (mut orchestrator, directory) = build_orchestrator();
    let catalog = treatment_protocols::standard_catalog();
    let diagnostics = DiagnosticUncertaintyEngine::new(HashMap::new());

    let events = generate_timeline(&config.temporal, rng);
    let total_patients: u32 = events.iter().map(|e| e.patient_count).sum();

    let mut patient_seq = 0u64;
    let mut pending_escalations = Vec::new();
    let mut event_idx = 0usize;
    let mut processed = 0u32;

    loop {
        guard.check().await?;

        while event_idx < events.len() && events[event_idx].timestamp <= orchestrator.simulation_time() {
            let event = &events[event_idx];
            let csu_residents = process_event(&mut orchestrator, &directory, &diagnostics, &catalog, event, &mut patient_seq, &mut pending_escalations, rng)?;
            if !csu_residents.is_empty() {
                orchestrator.evacuate_to_csu(&csu_residents)?;
            }
            processed += event.patient_count;
            event_idx += 1;
        }

        complete_due_escalations(&mut orchestrator, &mut pending_escalations)?;

        on_progress(JobProgressDetails {
            current_phase: "simulating".to_string(),
            phase_description: format!("simulated time {}m", orchestrator.simulation_time().as_minutes()),
            phase_progress: if total_patients == 0 { 100 } else { ((processed as f64 / total_patients as f64) * 100.0) as u8 },
            total_patients: Some(total_patients),
            processed_patients: Some(processed),
        });

        let status = orchestrator.system_status();
        let no_events_left = event_idx >= events.len();
        let all_patients_terminal = status.died + status.evacuated + status.discharged >= status.total_patients;
        let reached_ceiling = orchestrator.simulation_time().as_minutes() >= config.max_sim_minutes;
        let cohort_complete = no_events_left && pending_escalations.is_empty() && all_patients_terminal;

        if cohort_complete || reached_ceiling {
            break;
        }

        let rate_snapshot: Vec<(PatientId, f64)> = orchestrator
            .patients()
            .filter(|p| !p.state.is_terminal())
            .map(|p| (p.id.clone(), deterioration::base_rate(p.injury_type, p.severity_band(), &[])))
            .collect();
        for (id, rate) in rate_snapshot {
            orchestrator.deteriorate(&id, config.chunk_minutes, rate)?;
        }
        orchestrator.advance_clock(config.chunk_minutes);
    }

    let status = orchestrator.system_status();
    Ok(CohortRunOutcome {
        death_statistics: status.death_statistics.clone(),
        status,
        patients_generated: processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsim_common::SimInstant;
    use medsim_core::temporal_pattern::WarfareProfile;
    use medsim_core::temporal_pattern::Archetype;
    use medsim_core::temporal_pattern::WarfareType;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use crate::governor::{GovernorConfig, ResourceGovernor};

    fn small_config() -> CohortRunConfig {
        CohortRunConfig {
            temporal: TemporalConfig {
                days: 1,
                total_patients: 5,
                base_time: SimInstant::ZERO,
                warfare_profiles: vec![WarfareProfile {
                    warfare_type: WarfareType::Conventional,
                    weight: 1.0,
                    archetype: Archetype::Sustained {
                        peak_hours: vec![10, 11, 12],
                        peak_intensity: 1.5,
                        base_intensity: 1.0,
                        night_hours: vec![0, 1, 2, 3, 4, 5],
                        night_reduction: 0.5,
                    },
                    mass_casualty_probability: 0.0,
                    cluster_size_range: (1, 2),
                }],
                daily_intensity: vec![1.0],
                enable_special_events: false,
                environmental_modifiers: Vec::new(),
            },
            chunk_minutes: 60,
            max_sim_minutes: 24 * 60,
        }
    }

    #[tokio::test]
    async fn small_cohort_runs_to_completion_without_resource_limit_errors() {
        let governor = ResourceGovernor::new(GovernorConfig::default());
        let guard = governor.track("test-job").await;
        let mut rng = StdRng::seed_from_u64(11);
        let mut progress_calls = 0;
        let outcome = run_cohort(small_config(), &guard, &mut rng, |_| progress_calls += 1).await.unwrap();
        guard.finish().await;

        assert_eq!(outcome.patients_generated, 5);
        assert!(progress_calls > 0);
        assert_eq!(outcome.status.total_patients, 5);
    }
}
