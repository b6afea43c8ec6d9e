//! C5 — Triage Mapper
//!
//! Maps health + injury pattern to T1-T4, with mass-casualty adjustments
//! (spec.md 4.5).

use crate::patient::{SeverityBand, TriageCategory};

/// Injury tags that force an immediate (T1) triage regardless of health.
pub const IMMEDIATE_TAGS: &[&str] = &[
    "arterial_bleeding",
    "airway_compromise",
    "tension_pneumothorax",
    "hemorrhagic_shock",
    "severe_tbi",
];

/// `calculate_triage_category`: health-band baseline, then injury-pattern
/// overrides, then mass-casualty downgrades.
pub fn calculate_triage_category(
    health: f64,
    injury_tags: &[&str],
    severity_band: SeverityBand,
    mass_casualty: bool,
) -> TriageCategory {
    let mut category = baseline_from_health(health);

    if injury_tags.iter().any(|t| IMMEDIATE_TAGS.contains(t)) {
        category = TriageCategory::T1;
    }
    if injury_tags.contains(&"massive_head_trauma") && health < 20.0 {
        category = TriageCategory::T4;
    }

    if mass_casualty {
        category = mass_casualty_downgrade(category, health, severity_band);
    }

    category
}

fn baseline_from_health(health: f64) -> TriageCategory {
    if health < 10.0 {
        TriageCategory::T4
    } else if health < 40.0 {
        TriageCategory::T1
    } else if health < 70.0 {
        TriageCategory::T2
    } else {
        TriageCategory::T3
    }
}

/// Under MASCAL, conserve resources by downgrading borderline cases.
fn mass_casualty_downgrade(category: TriageCategory, health: f64, severity_band: SeverityBand) -> TriageCategory {
    match category {
        TriageCategory::T1 if health < 15.0 && matches!(severity_band, SeverityBand::Severe | SeverityBand::Critical) => {
            TriageCategory::T4
        }
        TriageCategory::T2 if health > 65.0 && matches!(severity_band, SeverityBand::Mild) => TriageCategory::T3,
        other => other,
    }
}

/// `prioritize(patients)`: stable sort by (category priority ascending,
/// current health ascending) — invariant 7.
pub fn prioritize<T>(patients: &mut [T], category_of: impl Fn(&T) -> TriageCategory, health_of: impl Fn(&T) -> f64) {
    patients.sort_by(|a, b| {
        let key_a = (category_of(a).priority(), health_of(a));
        let key_b = (category_of(b).priority(), health_of(b));
        key_a.partial_cmp(&key_b).unwrap()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_tag_forces_t1() {
        let category = calculate_triage_category(90.0, &["arterial_bleeding"], SeverityBand::Mild, false);
        assert_eq!(category, TriageCategory::T1);
    }

    #[test]
    fn mass_casualty_downgrades_borderline_t1() {
        let category = calculate_triage_category(12.0, &[], SeverityBand::Critical, true);
        assert_eq!(category, TriageCategory::T4);
    }

    #[test]
    fn prioritize_sorts_by_category_then_health() {
        let mut patients = vec![(TriageCategory::T2, 50.0), (TriageCategory::T1, 80.0), (TriageCategory::T1, 30.0)];
        prioritize(&mut patients, |p| p.0, |p| p.1);
        assert_eq!(patients, vec![(TriageCategory::T1, 30.0), (TriageCategory::T1, 80.0), (TriageCategory::T2, 50.0)]);
    }
}
