//! C13 — Patient Flow Orchestrator
//!
//! Owns the logical clock and the patient map, and drives every other
//! component through a single cohort's simulated lifetime (spec.md 4.13).
//! Single-threaded by design (spec.md 5): one orchestrator, one clock, no
//! internal locks — the job layer gives each cohort its own orchestrator and
//! its own copy of every component instead of sharing one across threads.

use crate::csu::{AddOutcome, CsuBatchCoordinator, ExecuteOutcome};
use crate::death_tracker::{DeathStatistics, DeathTracker};
use crate::facility::{AdmitResult, FacilityManager, FacilityType, TransferResult};
use crate::health_score::{self, HealthStatus};
use crate::overflow::{self, FacilityDirectory, RouteOutcome};
use crate::patient::{EventKind, InjuryType, Patient, PatientState, SeverityBand, TreatmentRecord, TriageCategory};
use crate::transport::{ScheduleOutcome, TransportPriority, TransportScheduler};
use crate::treatment_effects::TreatmentCatalog;
use crate::triage;
use medsim_common::{PatientId, SimDuration, SimError, SimInstant, SimResult};
use rand::Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct CohortMetrics {
    pub total_patients: u64,
    pub patients_treated: u64,
    pub patients_died: u64,
    pub patients_evacuated: u64,
    pub patients_discharged: u64,
    pub facility_overflow_events: u64,
    pub csu_batches_processed: u64,
    pub transport_missions: u64,
}

#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub simulation_time: SimInstant,
    pub total_patients: usize,
    pub alive: usize,
    pub died: usize,
    pub evacuated: usize,
    pub discharged: usize,
    pub in_treatment: usize,
    pub in_transport: usize,
    pub death_statistics: DeathStatistics,
    pub metrics: CohortMetrics,
}

pub struct Orchestrator {
    simulation_time: SimInstant,
    patients: HashMap<PatientId, Patient>,
    facilities: FacilityManager,
    directory: FacilityDirectory,
    transport: TransportScheduler,
    csu: CsuBatchCoordinator,
    catalog: TreatmentCatalog,
    death_tracker: DeathTracker,
    metrics: CohortMetrics,
}

impl Orchestrator {
    pub fn new(facilities: FacilityManager, directory: FacilityDirectory, transport: TransportScheduler, csu: CsuBatchCoordinator) -> Self {
        Self {
            simulation_time: SimInstant::ZERO,
            patients: HashMap::new(),
            facilities,
            directory,
            transport,
            csu,
            catalog: TreatmentCatalog::standard(),
            death_tracker: DeathTracker::new(),
            metrics: CohortMetrics::default(),
        }
    }

    pub fn simulation_time(&self) -> SimInstant {
        self.simulation_time
    }

    pub fn patient(&self, id: &PatientId) -> Option<&Patient> {
        self.patients.get(id)
    }

    /// `initialize_patient`: samples initial health from the injury profile,
    /// places the patient AT_POI, and records the `injured` timeline entry.
    pub fn initialize_patient(
        &mut self,
        id: PatientId,
        injury_type: InjuryType,
        severity: u8,
        true_condition_code: Option<String>,
        body_part: Option<String>,
        rng: &mut impl Rng,
    ) -> &Patient {
        let band = SeverityBand::from_ordinal(severity);
        let initial_health = health_score::initial_health(injury_type, band, None, rng);

        let mut patient = Patient {
            id: id.clone(),
            injury_type,
            severity,
            body_part,
            true_condition_code,
            initial_health,
            current_health: initial_health,
            triage_category: None,
            state: PatientState::AtPoi,
            location: "poi".to_string(),
            destination: None,
            active_transport: None,
            timeline: Vec::new(),
            treatments_received: Vec::new(),
            diagnoses: Vec::new(),
        };
        patient.record(self.simulation_time, EventKind::Injured, "poi", serde_json::json!({ "initial_health": initial_health }));

        self.metrics.total_patients += 1;
        self.patients.insert(id.clone(), patient);
        self.patients.get(&id).expect("just inserted")
    }

    /// `process_triage(id) -> (category, facility)`: re-derives the severity
    /// band from current health, maps T1->Role2/T2-T4->Role1 as the first
    /// preference, and falls back to the overflow router when that facility
    /// is unavailable.
    pub fn process_triage(&mut self, id: &PatientId, mass_casualty: bool) -> SimResult<(TriageCategory, FacilityType)> {
        let patient = self.patients.get(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        let category = triage::calculate_triage_category(patient.current_health, &[], patient.severity_band(), mass_casualty);

        let outcome = overflow::route_patient(
            &self.facilities,
            &self.directory,
            category,
            category == TriageCategory::T1,
            120.0,
            |_facility_type| 20.0,
            |facility_id, urgent| self.facilities.admit(facility_id, id.clone(), urgent).unwrap_or(AdmitResult::Queued { position: 0, priority: urgent }),
        );

        let (facility_type, location) = match outcome {
            RouteOutcome::Routed { facility, .. } => (facility, facility),
            RouteOutcome::Queued { facility, .. } => {
                self.metrics.facility_overflow_events += 1;
                (facility, facility)
            }
        };

        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        patient.triage_category = Some(category);
        patient.state = PatientState::InTriage;
        patient.location = format!("{location:?}");
        patient.record(
            self.simulation_time,
            EventKind::Triaged,
            &patient.location.clone(),
            serde_json::json!({ "category": format!("{category:?}") }),
        );

        Ok((category, facility_type))
    }

    /// `apply_treatment(id, treatments) -> new_health`: stacks effects via
    /// the treatment catalog, clamps to [0,100], and checks for death.
    /// `health_before` on the treatment record is the current health minus
    /// the treatment's boost at the moment of application — preserved
    /// verbatim, even negative, per the Design Notes' resolution of Open
    /// Question (a); only `current_health` itself is clamped.
    pub fn apply_treatment(&mut self, id: &PatientId, treatments: &[String]) -> SimResult<f64> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;

        for name in treatments {
            let (new_health, _) = self.catalog.apply(name, patient.current_health, 1.0);
            let health_before = patient.current_health - (new_health - patient.current_health).max(0.0);
            patient.current_health = new_health.clamp(0.0, 100.0);
            patient.treatments_received.push(TreatmentRecord {
                name: name.clone(),
                applied_at: self.simulation_time,
                health_before,
                health_after: patient.current_health,
            });
        }

        let location = patient.location.clone();
        patient.record(
            self.simulation_time,
            EventKind::TreatmentApplied,
            &location,
            serde_json::json!({ "treatments": treatments }),
        );
        self.metrics.patients_treated += 1;

        let health = patient.current_health;
        if health <= 0.0 {
            self.handle_death(id)?;
        } else if health >= 100.0 {
            // Explicit, deterministic RTD on transition (Design Notes' Open
            // Question (b)): a patient who reaches full health right after
            // treatment at a bed-holding facility is discharged here, rather
            // than only through the facility-transfer path, so a cohort
            // where nobody is evacuated to the CSU can still reach an
            // all-terminal state.
            if let Some((facility_type, facility_id)) = self.facility_for_location(&location) {
                if facility_type != FacilityType::Csu {
                    let _ = self.discharge(id, &facility_id);
                }
            }
        }
        Ok(health)
    }

    /// Matches a patient's `location` string against the facility directory,
    /// case-insensitively — `process_triage` records the `Debug` form of the
    /// facility type (e.g. `"Role1"`) while transport destinations use the
    /// lowercase facility name (e.g. `"role1"`).
    fn facility_for_location(&self, location: &str) -> Option<(FacilityType, medsim_common::FacilityId)> {
        self.directory
            .iter()
            .find(|(_, fid)| fid.as_str().eq_ignore_ascii_case(location))
            .map(|(facility_type, fid)| (*facility_type, fid.clone()))
    }

    /// `deteriorate(id, minutes)`, driven directly rather than only via
    /// `advance_time` so callers can apply it between explicit events.
    pub fn deteriorate(&mut self, id: &PatientId, minutes: u64, base_rate_per_hour: f64) -> SimResult<()> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        if patient.state.is_terminal() {
            return Ok(());
        }
        let active_names: Vec<&str> = patient.treatments_received.iter().map(|t| t.name.as_str()).collect();
        let stacked = crate::treatment_effects::stacked_deterioration_modifier(&self.catalog, &active_names);
        health_score::deteriorate(patient, minutes, base_rate_per_hour, &[stacked]);
        let dead = patient.is_dead();
        if dead {
            self.handle_death(id)?;
        }
        Ok(())
    }

    /// `recover(id, minutes, rate)`. RTD is never applied here: per the
    /// Design Notes' resolution of Open Question (b), reaching full health
    /// during bulk recovery or deterioration never auto-discharges a
    /// patient — discharge is only ever a deliberate call to
    /// [`Self::discharge`] from the facility-transfer path.
    pub fn recover(&mut self, id: &PatientId, minutes: u64, rate_per_hour: f64) -> SimResult<()> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        if patient.state.is_terminal() {
            return Ok(());
        }
        health_score::recover(patient, minutes, rate_per_hour);
        Ok(())
    }

    /// Deliberate return-to-duty: valid only for a patient at full health,
    /// in treatment, at a bed-holding facility, who has received at least
    /// one treatment (spec.md 4.13's discharge transition).
    pub fn discharge(&mut self, id: &PatientId, facility_id: &medsim_common::FacilityId) -> SimResult<()> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        if patient.current_health < 100.0 || patient.treatments_received.is_empty() {
            return Err(SimError::InvalidOperation("patient not eligible for return to duty".to_string()));
        }
        patient.state = PatientState::Discharged;
        let location = patient.location.clone();
        patient.record(self.simulation_time, EventKind::Discharged, &location, serde_json::json!({}));
        self.metrics.patients_discharged += 1;
        let _ = self.facilities.discharge(facility_id, id);
        Ok(())
    }

    /// `transport(id, destination) -> mission_id?`.
    pub fn transport(&mut self, id: &PatientId, origin: &str, destination: &str) -> SimResult<Option<medsim_common::MissionId>> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        let priority = if patient.triage_category == Some(TriageCategory::T1) {
            TransportPriority::Urgent
        } else {
            TransportPriority::Routine
        };

        let outcome = self.transport.schedule(self.simulation_time, id.clone(), origin, destination, priority, patient.current_health);
        let mission_id = match outcome {
            ScheduleOutcome::Scheduled(mission_id) => Some(mission_id),
            ScheduleOutcome::Queued { .. } => None,
        };

        patient.state = PatientState::InTransport;
        patient.destination = Some(destination.to_string());
        patient.active_transport = mission_id;
        patient.record(
            self.simulation_time,
            EventKind::TransportScheduled,
            destination,
            serde_json::json!({ "mission_id": mission_id.map(|m| m.to_string()) }),
        );
        self.metrics.transport_missions += 1;
        Ok(mission_id)
    }

    /// `complete_transport(id) -> bool`. `died_in_transit` handles death and
    /// returns `false`; otherwise admission is attempted at the destination,
    /// falling back to the overflow router and a rescheduled transport leg
    /// when the destination is full.
    pub fn complete_transport(&mut self, id: &PatientId, died_in_transit: bool) -> SimResult<bool> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        let Some(mission_id) = patient.active_transport else {
            return Err(SimError::InvalidOperation("patient has no active transport".to_string()));
        };
        self.transport.complete(self.simulation_time, mission_id, died_in_transit);

        if died_in_transit {
            self.handle_death(id)?;
            return Ok(false);
        }

        let destination = patient.destination.clone().unwrap_or_else(|| "role1".to_string());
        let facility_type = self
            .directory
            .iter()
            .find(|(_, fid)| fid.as_str() == destination)
            .map(|(ft, _)| *ft)
            .unwrap_or(FacilityType::Role1);
        let facility_id = self.directory.get(&facility_type).cloned().ok_or_else(|| SimError::NotFound(destination.clone()))?;

        let admit_result = self
            .facilities
            .admit(&facility_id, id.clone(), patient.triage_category == Some(TriageCategory::T1))
            .map_err(|e| SimError::InternalError(e.to_string()))?;
        match admit_result {
            AdmitResult::Admitted { .. } => {
                let patient = self.patients.get_mut(id).expect("patient exists");
                patient.state = PatientState::InTreatment;
                patient.location = destination.clone();
                patient.active_transport = None;
                patient.record(self.simulation_time, EventKind::Admitted, &destination, serde_json::json!({}));
                Ok(true)
            }
            AdmitResult::Queued { .. } => {
                self.metrics.facility_overflow_events += 1;
                let patient = self.patients.get_mut(id).expect("patient exists");
                patient.state = PatientState::InQueue;
                patient.record(self.simulation_time, EventKind::Queued, &destination, serde_json::json!({}));
                Ok(false)
            }
        }
    }

    /// `evacuate_to_csu(ids) -> bool`: adds living patients to the batch
    /// coordinator; when a batch becomes ready, prepares and marks the
    /// whole batch EVACUATED.
    pub fn evacuate_to_csu(&mut self, ids: &[PatientId]) -> SimResult<bool> {
        let mut batch_ready = false;
        for id in ids {
            let Some(patient) = self.patients.get(id) else { continue };
            if patient.is_dead() {
                continue;
            }
            let category = patient.triage_category.unwrap_or(TriageCategory::T3);
            let AddOutcome { batch_ready: ready, .. } = self.csu.add(self.simulation_time, id.clone(), category);
            batch_ready = ready;
        }

        if batch_ready {
            let role2 = self.directory.get(&FacilityType::Role2).cloned();
            let role3 = self.directory.get(&FacilityType::Role3).cloned();
            if let (Some(role2), Some(role3)) = (role2, role3) {
                let prepared = self.csu.prepare_transfer(&self.facilities, &role2, &role3);
                let destination_id = self.directory.get(&prepared.destination).cloned().unwrap_or(role2);
                if let ExecuteOutcome::Transferred { transferred_count } = self.csu.execute(&self.facilities, self.simulation_time, &destination_id, true) {
                    for id in &prepared.patient_ids {
                        if let Some(patient) = self.patients.get_mut(id) {
                            patient.state = PatientState::Evacuated;
                            patient.record(self.simulation_time, EventKind::Evacuated, "csu", serde_json::json!({}));
                        }
                    }
                    self.metrics.csu_batches_processed += 1;
                    self.metrics.patients_evacuated += transferred_count as u64;
                }
            }
        }
        Ok(batch_ready)
    }

    fn handle_death(&mut self, id: &PatientId) -> SimResult<()> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        let location = if patient.state == PatientState::InTransport {
            "in_transit".to_string()
        } else {
            patient.location.clone()
        };
        let treatments_received = patient.treatments_received.len();
        let injury_type = patient.injury_type;
        let initial_health = patient.initial_health;
        let final_health = patient.current_health;

        self.death_tracker
            .track_death(id.clone(), self.simulation_time, &location, injury_type, initial_health, final_health, treatments_received);

        patient.state = PatientState::Died;
        patient.current_health = 0.0;
        patient.record(self.simulation_time, EventKind::Died, &location, serde_json::json!({}));
        self.metrics.patients_died += 1;

        for facility_type in [FacilityType::Role1, FacilityType::Role2, FacilityType::Role3, FacilityType::Csu] {
            if let Some(facility_id) = self.directory.get(&facility_type) {
                let _ = self.facilities.discharge(facility_id, id);
            }
        }
        Ok(())
    }

    /// `advance_time(minutes)`: snapshots the patient-id list before
    /// iterating so patients admitted mid-call are unaffected for this tick
    /// (spec.md 4.13, invariant-adjacent: mutation during iteration would
    /// otherwise skip or double-visit entries).
    ///
    /// Applies the same `base_rate_per_hour` to every patient; a caller
    /// driving a cohort with per-patient injury profiles should instead tick
    /// the clock with [`Self::advance_clock`] and call [`Self::deteriorate`]
    /// per patient with each one's own rate.
    pub fn advance_time(&mut self, minutes: u64, base_rate_per_hour: f64) {
        self.simulation_time += SimDuration::minutes(minutes);

        let ids: Vec<PatientId> = self.patients.keys().cloned().collect();
        for id in ids {
            let Some(patient) = self.patients.get(&id) else { continue };
            if patient.state.is_terminal() {
                continue;
            }
            let _ = self.deteriorate(&id, minutes, base_rate_per_hour);
        }
    }

    /// Advances the logical clock alone, with no patient side effects.
    /// Used by callers (the job layer's cohort runner) that deteriorate each
    /// patient beforehand with its own per-patient rate rather than the
    /// single shared rate [`Self::advance_time`] applies to everyone.
    pub fn advance_clock(&mut self, minutes: u64) {
        self.simulation_time += SimDuration::minutes(minutes);
    }

    pub fn system_status(&self) -> SystemStatus {
        let mut alive = 0;
        let mut died = 0;
        let mut evacuated = 0;
        let mut discharged = 0;
        let mut in_treatment = 0;
        let mut in_transport = 0;
        for patient in self.patients.values() {
            match patient.state {
                PatientState::Died => died += 1,
                PatientState::Evacuated => evacuated += 1,
                PatientState::Discharged => discharged += 1,
                PatientState::InTreatment => {
                    alive += 1;
                    in_treatment += 1;
                }
                PatientState::InTransport => {
                    alive += 1;
                    in_transport += 1;
                }
                _ => alive += 1,
            }
        }

        SystemStatus {
            simulation_time: self.simulation_time,
            total_patients: self.patients.len(),
            alive,
            died,
            evacuated,
            discharged,
            in_treatment,
            in_transport,
            death_statistics: self.death_tracker.statistics(),
            metrics: self.metrics,
        }
    }

    pub fn health_status(&self, id: &PatientId) -> Option<HealthStatus> {
        self.patients.get(id).map(|p| health_score::status_for(p.current_health))
    }

    /// All patients materialized so far, for reporting and output-format
    /// writers; iteration order is unspecified (spec.md 3's `HashMap` patient
    /// store, not an ordered list).
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// `apply_diagnosis(id, facility, outcome)`: wires a C11
    /// [`crate::diagnostic_uncertainty::DiagnosisOutcome`] into the patient's
    /// diagnosis history and timeline, the step spec.md 2's data-flow
    /// paragraph describes as "on arrival C11 updates diagnosis".
    pub fn apply_diagnosis(
        &mut self,
        id: &PatientId,
        facility: medsim_common::FacilityId,
        outcome: crate::diagnostic_uncertainty::DiagnosisOutcome,
    ) -> SimResult<()> {
        let patient = self.patients.get_mut(id).ok_or_else(|| SimError::NotFound(id.to_string()))?;
        patient.diagnoses.push(crate::patient::DiagnosisRecord {
            facility,
            diagnosed_code: outcome.diagnosed_code.clone(),
            confidence: outcome.confidence,
            correct: outcome.correct,
        });
        let location = patient.location.clone();
        patient.record(
            self.simulation_time,
            EventKind::DiagnosisUpdated,
            &location,
            serde_json::json!({ "diagnosed_code": outcome.diagnosed_code, "correct": outcome.correct }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::Facility;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap as StdHashMap;

    fn orchestrator() -> Orchestrator {
        let facilities = FacilityManager::new();
        let mut directory = FacilityDirectory::new();
        for (facility_type, name) in [
            (FacilityType::Role1, "role1"),
            (FacilityType::Role2, "role2"),
            (FacilityType::Role3, "role3"),
            (FacilityType::Csu, "csu"),
        ] {
            let id = medsim_common::FacilityId::new(name);
            facilities.register(Facility::new(id.clone(), facility_type));
            directory.insert(facility_type, id);
        }
        let transport = TransportScheduler::new(StdHashMap::new());
        let csu = CsuBatchCoordinator::new(directory.get(&FacilityType::Csu).cloned().unwrap());
        Orchestrator::new(facilities, directory, transport, csu)
    }

    #[test]
    fn full_health_treated_patient_is_eligible_for_discharge() {
        let mut orch = orchestrator();
        let mut rng = StdRng::seed_from_u64(1);
        let id = PatientId::new("p1");
        orch.initialize_patient(id.clone(), InjuryType::Battle, 3, None, None, &mut rng);
        orch.process_triage(&id, false).unwrap();

        let patient = orch.patients.get_mut(&id).unwrap();
        patient.current_health = 100.0;
        patient.treatments_received.push(TreatmentRecord {
            name: "antibiotics".into(),
            applied_at: SimInstant::ZERO,
            health_before: 90.0,
            health_after: 100.0,
        });

        let facility_id = orch.directory.get(&FacilityType::Role1).cloned().unwrap();
        orch.discharge(&id, &facility_id).unwrap();
        assert_eq!(orch.patient(&id).unwrap().state, PatientState::Discharged);
    }

    /// RTD is wired directly into treatment application (Design Notes'
    /// resolution of Open Question (b)): reaching full health right after a
    /// treatment at a bed-holding facility discharges the patient without a
    /// separate facility-transfer call, so a cohort with no CSU evacuations
    /// can still reach an all-terminal state.
    #[test]
    fn apply_treatment_reaching_full_health_discharges_automatically() {
        let mut orch = orchestrator();
        let mut rng = StdRng::seed_from_u64(4);
        let id = PatientId::new("p4");
        orch.initialize_patient(id.clone(), InjuryType::Battle, 5, None, None, &mut rng);
        orch.process_triage(&id, false).unwrap();
        orch.patients.get_mut(&id).unwrap().current_health = 95.0;

        orch.apply_treatment(&id, &["major_surgery".to_string()]).unwrap();

        let patient = orch.patient(&id).unwrap();
        assert_eq!(patient.current_health, 100.0);
        assert_eq!(patient.state, PatientState::Discharged);
        assert_eq!(orch.system_status().discharged, 1);
    }

    #[test]
    fn deterioration_to_zero_health_marks_patient_dead() {
        let mut orch = orchestrator();
        let mut rng = StdRng::seed_from_u64(2);
        let id = PatientId::new("p2");
        orch.initialize_patient(id.clone(), InjuryType::Battle, 9, None, None, &mut rng);
        orch.patients.get_mut(&id).unwrap().current_health = 1.0;

        orch.deteriorate(&id, 60, 50.0).unwrap();
        assert_eq!(orch.patient(&id).unwrap().state, PatientState::Died);
        assert_eq!(orch.system_status().died, 1);
    }

    #[test]
    fn advance_time_skips_terminal_patients() {
        let mut orch = orchestrator();
        let mut rng = StdRng::seed_from_u64(3);
        let id = PatientId::new("p3");
        orch.initialize_patient(id.clone(), InjuryType::Battle, 2, None, None, &mut rng);
        orch.patients.get_mut(&id).unwrap().state = PatientState::Died;
        orch.patients.get_mut(&id).unwrap().current_health = 0.0;

        orch.advance_time(60, 10.0);
        assert_eq!(orch.patient(&id).unwrap().current_health, 0.0);
    }
}
