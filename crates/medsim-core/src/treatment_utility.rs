//! C3 — Treatment Utility Model
//!
//! Probabilistic selection of treatments via multi-attribute utility
//! (spec.md 4.3). Contraindications are hard-filtered by the caller using
//! the protocol catalog (C4) before scoring here.

use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};

pub const WEIGHT_APPROPRIATENESS: f64 = 0.35;
pub const WEIGHT_URGENCY: f64 = 0.25;
pub const WEIGHT_EFFECTIVENESS: f64 = 0.20;
pub const WEIGHT_AVAILABILITY: f64 = 0.15;
pub const WEIGHT_CAPABILITY: f64 = 0.05;

pub const TEMPERATURE: f64 = 0.5;
pub const UTILITY_FLOOR: f64 = 0.2;

/// Precomputed per-candidate component scores, each in [0,1].
#[derive(Debug, Clone)]
pub struct TreatmentCandidate {
    pub name: String,
    pub appropriateness: f64,
    pub urgency: f64,
    pub effectiveness: f64,
    pub availability: f64,
    pub capability: f64,
}

impl TreatmentCandidate {
    pub fn utility(&self) -> f64 {
        WEIGHT_APPROPRIATENESS * self.appropriateness
            + WEIGHT_URGENCY * self.urgency
            + WEIGHT_EFFECTIVENESS * self.effectiveness
            + WEIGHT_AVAILABILITY * self.availability
            + WEIGHT_CAPABILITY * self.capability
    }
}

/// Matrix lookup for appropriateness: 0 if contraindicated, 0.3 default for
/// an (condition, treatment) pair the matrix doesn't recognize.
pub fn appropriateness_lookup(matrix: &[(&str, &str, f64)], condition_code: &str, treatment: &str, contraindicated: bool) -> f64 {
    if contraindicated {
        return 0.0;
    }
    matrix
        .iter()
        .find(|(c, t, _)| *c == condition_code && *t == treatment)
        .map(|(_, _, score)| *score)
        .unwrap_or(0.3)
}

/// `exp(-lambda*t)` for treatments with a golden-window entry, 0.8 otherwise.
pub fn urgency(has_golden_window: bool, lambda: f64, elapsed_minutes: f64) -> f64 {
    if has_golden_window {
        (-lambda * elapsed_minutes).exp()
    } else {
        0.8
    }
}

/// Severity-weighted base effectiveness, with a 1.2x boost for
/// critical/life-saving treatments on severe-or-worse patients.
pub fn effectiveness(base: f64, is_critical_treatment: bool, severity: u8) -> f64 {
    let score = base;
    if is_critical_treatment && severity >= 7 {
        (score * 1.2).min(1.0)
    } else {
        score
    }
}

/// Linear in remaining supply: `supply / capacity`, clamped to [0,1].
pub fn availability(supply: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        0.0
    } else {
        (supply / capacity).clamp(0.0, 1.0)
    }
}

/// Binary: listed at the facility, or the facility carries the "all" wildcard.
pub fn capability(facility_treatments: &[&str], treatment: &str) -> f64 {
    if facility_treatments.contains(&"all") || facility_treatments.contains(&treatment) {
        1.0
    } else {
        0.0
    }
}

/// `select_treatments`: drop anything below the utility floor, softmax-sample
/// up to `max_n` without replacement at `TEMPERATURE`, then re-sort the
/// selection by utility descending (ties broken by utility, which is already
/// the sort key).
///
/// Returns the fallback name(s) if no candidate clears the utility floor.
pub fn select_treatments(
    candidates: &[TreatmentCandidate],
    max_n: usize,
    fallback: &[String],
    rng: &mut impl Rng,
) -> Vec<String> {
    let mut viable: Vec<(&TreatmentCandidate, f64)> = candidates
        .iter()
        .map(|c| (c, c.utility()))
        .filter(|(_, u)| *u > UTILITY_FLOOR)
        .collect();

    if viable.is_empty() {
        return fallback.to_vec();
    }

    let mut selected: Vec<(String, f64)> = Vec::new();
    let take = max_n.min(viable.len());

    for _ in 0..take {
        let weights: Vec<f64> = viable.iter().map(|(_, u)| (u / TEMPERATURE).exp()).collect();
        let dist = WeightedIndex::new(&weights).expect("at least one positive weight");
        let idx = dist.sample(rng);
        let (candidate, utility) = viable.remove(idx);
        selected.push((candidate.name.clone(), utility));
    }

    selected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    selected.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn candidate(name: &str, utility_parts: (f64, f64, f64, f64, f64)) -> TreatmentCandidate {
        TreatmentCandidate {
            name: name.to_string(),
            appropriateness: utility_parts.0,
            urgency: utility_parts.1,
            effectiveness: utility_parts.2,
            availability: utility_parts.3,
            capability: utility_parts.4,
        }
    }

    #[test]
    fn contraindicated_scores_zero_appropriateness() {
        let score = appropriateness_lookup(&[], "hemorrhage", "tourniquet", true);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn below_floor_candidates_fall_back() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = vec![candidate("weak", (0.1, 0.1, 0.1, 0.1, 0.1))];
        let fallback = vec!["psychological_first_aid".to_string()];
        let chosen = select_treatments(&candidates, 2, &fallback, &mut rng);
        assert_eq!(chosen, fallback);
    }

    #[test]
    fn selection_is_sorted_by_utility_descending() {
        let mut rng = StdRng::seed_from_u64(42);
        let candidates = vec![
            candidate("low", (0.5, 0.5, 0.5, 0.5, 1.0)),
            candidate("high", (1.0, 1.0, 1.0, 1.0, 1.0)),
        ];
        let chosen = select_treatments(&candidates, 2, &[], &mut rng);
        assert_eq!(chosen, vec!["high".to_string(), "low".to_string()]);
    }
}
