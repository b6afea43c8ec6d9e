//! C11 — Diagnostic Uncertainty Engine
//!
//! Models imperfect diagnosis: facility-progressive accuracy, confusion
//! matrix misdiagnosis, and confidence growth over time spent with a patient
//! (spec.md 4.11). Orchestrator-facing callers are expected to degrade to
//! "no diagnostic uncertainty" if this engine is unavailable — this module
//! itself never panics or fails, it only returns lower-confidence output.

use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticFacility {
    Poi,
    Role1,
    Role2,
    Role3,
    Role4,
}

/// Base diagnostic accuracy by echelon — POI medics have the least time and
/// equipment, Role4 has full diagnostic capability (spec.md 4.11).
pub fn base_accuracy(facility: DiagnosticFacility) -> f64 {
    match facility {
        DiagnosticFacility::Poi => 0.65,
        DiagnosticFacility::Role1 => 0.75,
        DiagnosticFacility::Role2 => 0.85,
        DiagnosticFacility::Role3 => 0.95,
        DiagnosticFacility::Role4 => 0.98,
    }
}

/// Triage severity nudges accuracy: obvious critical presentations are
/// easier to call correctly than borderline ones.
fn severity_modifier(category_priority: u8) -> f64 {
    match category_priority {
        1 => 0.02,
        2 => 0.0,
        3 => -0.02,
        _ => -0.05,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImprovementParams {
    pub max_improvement: f64,
    pub time_factor: f64,
}

impl Default for ImprovementParams {
    fn default() -> Self {
        Self {
            max_improvement: 0.15,
            time_factor: 0.5,
        }
    }
}

/// `get_diagnostic_accuracy(facility, triage_priority, environmental_modifiers,
/// hours_with_patient)`: base + severity nudge + summed environmental
/// modifiers + an exponential improvement term that saturates toward
/// `max_improvement` the longer the patient has been under observation,
/// clamped to [0,1].
pub fn diagnostic_accuracy(
    facility: DiagnosticFacility,
    triage_priority: u8,
    environmental_modifiers: &[f64],
    hours_with_patient: f64,
    improvement: &ImprovementParams,
) -> f64 {
    let environmental: f64 = environmental_modifiers.iter().sum();
    let time_gain = improvement.max_improvement * (1.0 - (-improvement.time_factor * hours_with_patient).exp());
    (base_accuracy(facility) + severity_modifier(triage_priority) + environmental + time_gain).clamp(0.0, 1.0)
}

/// Fallback codes used when a misdiagnosis has no condition-specific
/// confusion-matrix entry.
const GENERIC_MISDIAGNOSIS_CODES: &[&str] = &[
    "55822004",  // general malaise
    "271807003", // skin disorder, unspecified
    "29857009",  // chest pain, unspecified
    "162059005", // ill-defined condition
    "386661006", // fever, unspecified
];

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisOutcome {
    pub diagnosed_code: String,
    pub correct: bool,
    pub confidence: f64,
}

pub struct DiagnosticUncertaintyEngine {
    confusion_matrices: HashMap<String, Vec<(String, f64)>>,
    improvement: ImprovementParams,
}

impl DiagnosticUncertaintyEngine {
    pub fn new(confusion_matrices: HashMap<String, Vec<(String, f64)>>) -> Self {
        Self {
            confusion_matrices,
            improvement: ImprovementParams::default(),
        }
    }

    /// `diagnose_condition(true_code, facility, triage_priority,
    /// environmental_modifiers, hours_with_patient)`: a Bernoulli draw
    /// against the computed accuracy; on failure, the misdiagnosis is drawn
    /// from the condition's confusion matrix (weighted) or a generic list.
    pub fn diagnose_condition(
        &self,
        true_code: &str,
        facility: DiagnosticFacility,
        triage_priority: u8,
        environmental_modifiers: &[f64],
        hours_with_patient: f64,
        rng: &mut impl Rng,
    ) -> DiagnosisOutcome {
        let accuracy = diagnostic_accuracy(facility, triage_priority, environmental_modifiers, hours_with_patient, &self.improvement);

        if rng.gen::<f64>() < accuracy {
            DiagnosisOutcome {
                diagnosed_code: true_code.to_string(),
                correct: true,
                confidence: accuracy,
            }
        } else {
            let misdiagnosed = self.select_misdiagnosis(true_code, rng);
            DiagnosisOutcome {
                diagnosed_code: misdiagnosed,
                correct: false,
                confidence: accuracy,
            }
        }
    }

    fn select_misdiagnosis(&self, true_code: &str, rng: &mut impl Rng) -> String {
        if let Some(entries) = self.confusion_matrices.get(true_code) {
            if !entries.is_empty() {
                let weights: Vec<f64> = entries.iter().map(|(_, w)| *w).collect();
                if let Ok(dist) = WeightedIndex::new(&weights) {
                    return entries[dist.sample(rng)].0.clone();
                }
            }
        }
        let idx = rng.gen_range(0..GENERIC_MISDIAGNOSIS_CODES.len());
        GENERIC_MISDIAGNOSIS_CODES[idx].to_string()
    }

    /// `update_diagnosis_with_progression`: re-diagnoses at a new,
    /// presumably-better-equipped facility. Returns the new outcome plus the
    /// raw accuracy delta versus the facility left behind, for timeline
    /// reporting.
    pub fn update_diagnosis_with_progression(
        &self,
        true_code: &str,
        old_facility: DiagnosticFacility,
        new_facility: DiagnosticFacility,
        triage_priority: u8,
        environmental_modifiers: &[f64],
        rng: &mut impl Rng,
    ) -> (DiagnosisOutcome, f64) {
        let old_accuracy = diagnostic_accuracy(old_facility, triage_priority, environmental_modifiers, 0.0, &self.improvement);
        // A transfer resets the observation clock at the new facility but
        // credits a short head start for the prior examinations.
        let outcome = self.diagnose_condition(true_code, new_facility, triage_priority, environmental_modifiers, 0.5, rng);
        let new_accuracy = diagnostic_accuracy(new_facility, triage_priority, environmental_modifiers, 0.5, &self.improvement);
        (outcome, new_accuracy - old_accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn accuracy_increases_from_poi_to_role4() {
        assert!(base_accuracy(DiagnosticFacility::Poi) < base_accuracy(DiagnosticFacility::Role4));
    }

    #[test]
    fn accuracy_improves_with_time_with_patient() {
        let params = ImprovementParams::default();
        let early = diagnostic_accuracy(DiagnosticFacility::Role1, 2, &[], 0.0, &params);
        let later = diagnostic_accuracy(DiagnosticFacility::Role1, 2, &[], 10.0, &params);
        assert!(later > early);
    }

    #[test]
    fn high_base_accuracy_usually_diagnoses_correctly() {
        let engine = DiagnosticUncertaintyEngine::new(HashMap::new());
        let mut rng = StdRng::seed_from_u64(3);
        let mut correct = 0;
        for _ in 0..100 {
            let outcome = engine.diagnose_condition("traumatic_amputation", DiagnosticFacility::Role4, 1, &[], 2.0, &mut rng);
            if outcome.correct {
                correct += 1;
            }
        }
        assert!(correct > 80);
    }

    #[test]
    fn misdiagnosis_without_matrix_entry_falls_back_to_generic() {
        let engine = DiagnosticUncertaintyEngine::new(HashMap::new());
        let mut rng = StdRng::seed_from_u64(1);
        let code = engine.select_misdiagnosis("unmapped_condition", &mut rng);
        assert!(GENERIC_MISDIAGNOSIS_CODES.contains(&code.as_str()));
    }

    /// Confidence is always reported as `accuracy`, correct or not — a
    /// misdiagnosis at a higher-accuracy facility must still report a
    /// confidence at least as high as a correct diagnosis at an earlier,
    /// lower-accuracy one (spec.md S6: "per-patient latest-diagnosis
    /// confidence is non-decreasing across facility progression").
    #[test]
    fn misdiagnosis_confidence_matches_accuracy_not_its_inverse() {
        let engine = DiagnosticUncertaintyEngine::new(HashMap::new());
        let mut rng = StdRng::seed_from_u64(42);
        let role1_accuracy = diagnostic_accuracy(DiagnosticFacility::Role1, 2, &[], 0.0, &ImprovementParams::default());
        let role2_accuracy = diagnostic_accuracy(DiagnosticFacility::Role2, 2, &[], 0.0, &ImprovementParams::default());

        let mut saw_misdiagnosis = false;
        for _ in 0..200 {
            let outcome = engine.diagnose_condition("unmapped_condition", DiagnosticFacility::Role2, 2, &[], 0.0, &mut rng);
            if !outcome.correct {
                saw_misdiagnosis = true;
                assert_eq!(outcome.confidence, role2_accuracy);
                assert!(outcome.confidence >= role1_accuracy);
            }
        }
        assert!(saw_misdiagnosis, "expected at least one misdiagnosis over 200 draws");
    }
}
