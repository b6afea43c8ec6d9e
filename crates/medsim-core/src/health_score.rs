//! C2 — Health-Score Engine
//!
//! Initial health sampling, hour-indexed timeline integration, and the
//! sub-hour `deteriorate`/`recover` primitives the orchestrator drives
//! directly (spec.md 4.2).

use crate::patient::{InjuryType, Patient, SeverityBand, TriageCategory};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `(mean, variance)` for initial health, by (injury_type, severity band).
fn band_table(injury_type: InjuryType, band: SeverityBand) -> (f64, f64) {
    use InjuryType::*;
    use SeverityBand::*;
    match (injury_type, band) {
        (Battle, Mild) => (88.0, 5.0),
        (Battle, Moderate) => (75.0, 7.0),
        (Battle, Severe) => (55.0, 8.0),
        (Battle, Critical) => (35.0, 8.0),
        (NonBattle, Mild) => (90.0, 5.0),
        (NonBattle, Moderate) => (78.0, 6.0),
        (NonBattle, Severe) => (60.0, 8.0),
        (NonBattle, Critical) => (40.0, 8.0),
        (Disease, Mild) => (92.0, 4.0),
        (Disease, Moderate) => (80.0, 6.0),
        (Disease, Severe) => (62.0, 8.0),
        (Disease, Critical) => (42.0, 8.0),
    }
}

/// Severity-number bucketing fallback (spec.md 4.2), returned as a uniform
/// range rather than mean/variance since the source expresses it that way.
pub fn fallback_range_from_ordinal(severity: u8) -> (f64, f64) {
    match severity {
        9..=10 => (30.0, 50.0),
        7..=8 => (50.0, 65.0),
        4..=6 => (70.0, 85.0),
        _ => (85.0, 95.0),
    }
}

/// `initial_health`: sampled uniformly from `[mean - variance, mean + variance]`,
/// clamped to [0,100]. `condition_override` lets a specific condition code
/// substitute its own `(mean, variance)`; when neither the band table nor an
/// override applies, callers should use [`fallback_range_from_ordinal`]
/// directly (kept as a standalone function since it returns a range, not a
/// mean/variance pair).
pub fn initial_health(
    injury_type: InjuryType,
    band: SeverityBand,
    condition_override: Option<(f64, f64)>,
    rng: &mut impl Rng,
) -> f64 {
    let (mean, variance) = condition_override.unwrap_or_else(|| band_table(injury_type, band));
    rng.gen_range((mean - variance)..=(mean + variance)).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Dead,
    Critical,
    Unstable,
    Stable,
    Good,
}

pub fn status_for(health: f64) -> HealthStatus {
    if health <= 0.0 {
        HealthStatus::Dead
    } else if health < 10.0 {
        HealthStatus::Critical
    } else if health < 40.0 {
        HealthStatus::Unstable
    } else if health < 70.0 {
        HealthStatus::Stable
    } else {
        HealthStatus::Good
    }
}

/// A deterioration/treatment modifier active from `start_hour` onward.
#[derive(Debug, Clone, Copy)]
pub struct Modifier {
    pub start_hour: u32,
    pub factor: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TimelineParams {
    pub golden_hour_boundary: f64,
    pub ramp_cap: f64,
    pub ramp_hours: f64,
    pub cliff_enabled: bool,
    pub cliff_probability: f64,
    pub cliff_band: (f64, f64),
    pub cliff_drop_range: (f64, f64),
}

impl Default for TimelineParams {
    fn default() -> Self {
        Self {
            golden_hour_boundary: 1.0,
            ramp_cap: 2.5,
            ramp_hours: 6.0,
            cliff_enabled: false,
            cliff_probability: 0.05,
            cliff_band: (10.0, 70.0),
            cliff_drop_range: (15.0, 30.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HourEntry {
    pub hour: u32,
    pub health: f64,
    pub status: HealthStatus,
    pub effective_rate: f64,
}

/// `calculate_timeline(type, severity, hours, base_rate, modifiers?)`.
pub fn calculate_timeline(
    initial_health: f64,
    hours: u32,
    base_rate: f64,
    modifiers: &[Modifier],
    params: &TimelineParams,
    rng: &mut impl Rng,
) -> Vec<HourEntry> {
    let mut health = initial_health;
    let mut out = Vec::with_capacity(hours as usize);

    for hour in 0..hours {
        let active_factor: f64 = modifiers
            .iter()
            .filter(|m| m.start_hour as f64 <= hour as f64)
            .map(|m| m.factor)
            .product();
        let mut effective_rate = base_rate * if modifiers.is_empty() { 1.0 } else { active_factor };

        if (hour as f64 + 1.0) > params.golden_hour_boundary {
            let hours_past = (hour as f64 + 1.0) - params.golden_hour_boundary;
            let ramp_progress = (hours_past / params.ramp_hours).min(1.0);
            let ramp = 1.0 + (params.ramp_cap - 1.0) * ramp_progress;
            effective_rate *= ramp;
        }

        if params.cliff_enabled
            && health >= params.cliff_band.0
            && health <= params.cliff_band.1
            && rng.gen::<f64>() < params.cliff_probability
        {
            let drop = rng.gen_range(params.cliff_drop_range.0..=params.cliff_drop_range.1);
            health -= drop;
        }

        health = (health - effective_rate).clamp(0.0, 100.0);

        out.push(HourEntry {
            hour,
            health,
            status: status_for(health),
            effective_rate,
        });

        if health <= 0.0 {
            break;
        }
    }

    out
}

/// Deterioration is worse for the most urgent triage categories left
/// untreated, and is damped by the single strongest active treatment.
pub fn triage_multiplier(category: Option<TriageCategory>) -> f64 {
    match category {
        Some(TriageCategory::T1) => 1.3,
        Some(TriageCategory::T2) => 1.1,
        _ => 1.0,
    }
}

/// `best-of active treatment deterioration modifiers` (spec.md 4.2): the
/// strongest (lowest) modifier wins, not a stacked product — see
/// `treatment_effects::stacked_deterioration_modifier` for the supplemented
/// diminishing-returns variant used when multiple treatments truly combine.
pub fn best_treatment_modifier(active_modifiers: &[f64]) -> f64 {
    active_modifiers.iter().cloned().fold(1.0_f64, f64::min)
}

/// `deteriorate(patient, minutes)`.
pub fn deteriorate(patient: &mut Patient, minutes: u64, base_rate_per_hour: f64, active_treatment_modifiers: &[f64]) {
    let effective_rate =
        base_rate_per_hour * triage_multiplier(patient.triage_category) * best_treatment_modifier(active_treatment_modifiers);
    let delta = -(effective_rate / 60.0) * minutes as f64;
    patient.apply_health_delta(delta);
}

/// `recover(patient, minutes, rate_per_hour)` — symmetric, Role2+ only by
/// orchestrator policy (not enforced here; this is a pure function).
pub fn recover(patient: &mut Patient, minutes: u64, rate_per_hour: f64) {
    let delta = (rate_per_hour / 60.0) * minutes as f64;
    patient.apply_health_delta(delta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn status_thresholds_match_spec() {
        assert_eq!(status_for(0.0), HealthStatus::Dead);
        assert_eq!(status_for(5.0), HealthStatus::Critical);
        assert_eq!(status_for(39.9), HealthStatus::Unstable);
        assert_eq!(status_for(69.9), HealthStatus::Stable);
        assert_eq!(status_for(70.0), HealthStatus::Good);
    }

    #[test]
    fn timeline_reduces_health_by_rate_times_hours_before_ramp() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = TimelineParams {
            golden_hour_boundary: 100.0, // push the ramp out of range for this check
            ..Default::default()
        };
        let entries = calculate_timeline(100.0, 1, 10.0, &[], &params, &mut rng);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].health, 90.0);
    }

    #[test]
    fn deteriorate_is_reproducible_given_inputs() {
        // invariant 9-adjacent: same inputs, same output, no randomness involved
        let mut p = sample_patient();
        deteriorate(&mut p, 30, 10.0, &[]);
        assert_eq!(p.current_health, 95.0);
    }

    fn sample_patient() -> Patient {
        Patient {
            id: medsim_common::PatientId::new("p1"),
            injury_type: InjuryType::Battle,
            severity: 5,
            body_part: None,
            true_condition_code: None,
            initial_health: 100.0,
            current_health: 100.0,
            triage_category: Some(TriageCategory::T3),
            state: crate::patient::PatientState::AtPoi,
            location: "poi".into(),
            destination: None,
            active_transport: None,
            timeline: Vec::new(),
            treatments_received: Vec::new(),
            diagnoses: Vec::new(),
        }
    }
}
