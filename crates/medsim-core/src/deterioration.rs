//! C1 — Deterioration Calculator
//!
//! Base and compound per-hour health-loss rates from an injury profile
//! (spec.md 4.1). Tables are loaded once at process start as plain structs
//! — never mutated on disk, matching the Design Notes' "global configuration
//! state" resolution.

use crate::patient::{InjuryType, SeverityBand};
use serde::{Deserialize, Serialize};

/// Words that, if present in an injury description, trigger the hemorrhage
/// multiplier. Applied at most once regardless of how many words match.
pub const HEMORRHAGE_LEXICON: &[&str] = &[
    "bleeding",
    "laceration",
    "amputation",
    "arterial",
    "vascular",
    "penetrating",
    "gunshot",
];

pub const HEMORRHAGE_MULTIPLIER: f64 = 1.5;

/// health/hour lost, before any environmental or hemorrhage adjustment.
fn base_table(injury_type: InjuryType, band: SeverityBand) -> f64 {
    use InjuryType::*;
    use SeverityBand::*;
    match (injury_type, band) {
        (Battle, Mild) => 2.0,
        (Battle, Moderate) => 4.0,
        (Battle, Severe) => 8.0,
        (Battle, Critical) => 15.0,
        (NonBattle, Mild) => 1.0,
        (NonBattle, Moderate) => 2.5,
        (NonBattle, Severe) => 5.0,
        (NonBattle, Critical) => 10.0,
        (Disease, Mild) => 0.5,
        (Disease, Moderate) => 1.5,
        (Disease, Severe) => 3.0,
        (Disease, Critical) => 6.0,
    }
}

/// injury type multiplier applied to stabilization windows (spec.md 4.1).
fn injury_type_multiplier(injury_type: InjuryType) -> f64 {
    match injury_type {
        InjuryType::Battle => 1.0,
        InjuryType::NonBattle => 1.5,
        InjuryType::Disease => 3.0,
    }
}

/// `base_rate(injury_type, severity_band, injuries?) -> health/hour`.
///
/// `descriptions` is the free-text injury description list used for the
/// hemorrhage-lexicon match; an empty slice never triggers the multiplier.
pub fn base_rate(injury_type: InjuryType, band: SeverityBand, descriptions: &[&str]) -> f64 {
    let rate = base_table(injury_type, band);
    let hemorrhage = descriptions.iter().any(|d| {
        let lower = d.to_lowercase();
        HEMORRHAGE_LEXICON.iter().any(|word| lower.contains(word))
    });
    if hemorrhage {
        rate * HEMORRHAGE_MULTIPLIER
    } else {
        rate
    }
}

/// `compound(list_of_injuries) -> health/hour`.
///
/// The strongest per-injury rate is the primary contributor; every other
/// injury contributes 0.3x its own rate. Result is capped at 100 health/hour
/// (a patient can never lose more than their entire health bar in one hour
/// from the compound calculation alone).
pub fn compound(rates: &[f64]) -> f64 {
    if rates.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = rates.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let primary = sorted[0];
    let secondary: f64 = sorted[1..].iter().map(|r| r * 0.3).sum();
    (primary + secondary).min(100.0)
}

/// Environmental conditions multiply compositionally: `rate * m1 * m2 * ...`.
pub fn environmental(rate: f64, modifiers: &[f64]) -> f64 {
    modifiers.iter().fold(rate, |acc, m| acc * m)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilizationWindow {
    pub platinum_10: f64,
    pub golden_hour: f64,
    pub maximum_survivable: f64,
}

/// `stabilization_window(type, band) -> {platinum_10, golden_hour, maximum_survivable}`,
/// minutes. Platinum 10 is a fixed physiological window and is not scaled;
/// golden hour and maximum survivable scale by the injury-type multiplier.
pub fn stabilization_window(injury_type: InjuryType, band: SeverityBand) -> StabilizationWindow {
    use SeverityBand::*;
    let (golden_hour, maximum_survivable) = match band {
        Critical => (60.0, 120.0),
        Severe => (60.0, 180.0),
        Moderate => (60.0, 360.0),
        Mild => (60.0, 720.0),
    };
    let m = injury_type_multiplier(injury_type);
    StabilizationWindow {
        platinum_10: 10.0,
        golden_hour: golden_hour * m,
        maximum_survivable: maximum_survivable * m,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterventionPoint {
    pub threshold: f64,
    pub hours_until: f64,
    pub category: &'static str,
}

/// `intervention_points(rate, initial_health) -> list of (threshold, hours_until, category)`.
///
/// Thresholds mirror the status bands used by the health-score engine
/// (spec.md 4.2): stable/unstable/critical/dead. Only thresholds below the
/// starting health are meaningful; each is projected forward at the given
/// constant rate.
pub fn intervention_points(rate: f64, initial_health: f64) -> Vec<InterventionPoint> {
    if rate <= 0.0 {
        return Vec::new();
    }
    const THRESHOLDS: &[(f64, &str)] = &[
        (70.0, "stable_to_unstable"),
        (40.0, "unstable_to_critical"),
        (10.0, "critical_to_dead"),
        (0.0, "dead"),
    ];
    THRESHOLDS
        .iter()
        .filter(|(threshold, _)| *threshold < initial_health)
        .map(|(threshold, category)| InterventionPoint {
            threshold: *threshold,
            hours_until: (initial_health - threshold) / rate,
            category,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemorrhage_multiplier_applies_once() {
        let plain = base_rate(InjuryType::Battle, SeverityBand::Severe, &[]);
        let bleeding = base_rate(InjuryType::Battle, SeverityBand::Severe, &["gunshot wound, arterial bleed"]);
        assert_eq!(bleeding, plain * HEMORRHAGE_MULTIPLIER);
    }

    #[test]
    fn compound_caps_at_100() {
        let rate = compound(&[80.0, 90.0, 70.0]);
        assert_eq!(rate, 100.0);
    }

    #[test]
    fn compound_uses_strongest_as_primary() {
        let rate = compound(&[10.0, 5.0, 2.0]);
        assert_eq!(rate, 10.0 + 5.0 * 0.3 + 2.0 * 0.3);
    }

    #[test]
    fn windows_scale_by_injury_type() {
        let battle = stabilization_window(InjuryType::Battle, SeverityBand::Severe);
        let disease = stabilization_window(InjuryType::Disease, SeverityBand::Severe);
        assert_eq!(battle.platinum_10, disease.platinum_10);
        assert_eq!(disease.golden_hour, battle.golden_hour * 3.0);
    }

    #[test]
    fn intervention_points_only_below_initial_health() {
        let points = intervention_points(10.0, 50.0);
        assert!(points.iter().all(|p| p.threshold < 50.0));
        assert!(points.iter().any(|p| p.category == "unstable_to_critical"));
    }
}
