//! Treatment modifier catalog and stacked-effect modeling.
//!
//! Supplements spec.md 4.2/4.4: a fixed catalog of named treatments with a
//! health boost and a deterioration modifier, plus diminishing-returns
//! stacking when several treatments are simultaneously active
//! (SPEC_FULL.md section C).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreatmentEffect {
    pub health_boost: f64,
    pub deterioration_modifier: f64,
    pub duration_hours: u32,
}

pub struct TreatmentCatalog {
    effects: HashMap<&'static str, TreatmentEffect>,
}

impl TreatmentCatalog {
    pub fn standard() -> Self {
        let mut effects = HashMap::new();
        let mut add = |name, health_boost, deterioration_modifier, duration_hours| {
            effects.insert(
                name,
                TreatmentEffect {
                    health_boost,
                    deterioration_modifier,
                    duration_hours,
                },
            );
        };
        add("tourniquet", 15.0, 0.3, 2);
        add("pressure_dressing", 10.0, 0.4, 4);
        add("hemostatic_gauze", 12.0, 0.35, 6);
        add("iv_access", 20.0, 0.6, 8);
        add("morphine", 5.0, 0.9, 4);
        add("antibiotics", 8.0, 0.8, 24);
        add("blood_transfusion", 30.0, 0.4, 12);
        add("chest_tube", 25.0, 0.3, 48);
        add("surgical_stabilization", 35.0, 0.2, 72);
        add("damage_control_surgery", 35.0, 0.2, 72);
        add("major_surgery", 45.0, 0.1, 168);
        add("organ_repair", 40.0, 0.15, 168);
        add("airway_positioning", 10.0, 0.5, 2);
        add("needle_decompression", 20.0, 0.3, 4);
        add("intubation", 25.0, 0.25, 12);
        add("psychological_first_aid", 5.0, 0.9, 4);
        add("oral_rehydration", 5.0, 0.85, 6);
        Self { effects }
    }

    pub fn get(&self, name: &str) -> Option<TreatmentEffect> {
        self.effects.get(name).copied()
    }

    /// `apply_treatment`: health boost clamped at 100, deterioration
    /// multiplied by the treatment's own modifier.
    pub fn apply(&self, name: &str, current_health: f64, current_deterioration: f64) -> (f64, f64) {
        match self.get(name) {
            Some(effect) => (
                (current_health + effect.health_boost).min(100.0),
                current_deterioration * effect.deterioration_modifier,
            ),
            None => (current_health, current_deterioration),
        }
    }
}

impl Default for TreatmentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// `calculate_stacked_effects`: each additional active treatment is 80% as
/// effective as the previous one (diminishing returns), floored at a
/// combined 10% of baseline deterioration.
pub fn stacked_deterioration_modifier(catalog: &TreatmentCatalog, active_treatment_names: &[&str]) -> f64 {
    if active_treatment_names.is_empty() {
        return 1.0;
    }
    let mut combined = 1.0_f64;
    for (i, name) in active_treatment_names.iter().enumerate() {
        let modifier = catalog.get(name).map(|e| e.deterioration_modifier).unwrap_or(1.0);
        let effectiveness = 0.8_f64.powi(i as i32);
        let effective_modifier = 1.0 - (1.0 - modifier) * effectiveness;
        combined *= effective_modifier;
    }
    combined.max(0.1)
}

/// Coarse body-region keyword filter layered in front of the protocol
/// catalog's facility/severity filtering (C4), matching the original's
/// `get_available_treatments` region gate.
pub fn region_filter<'a>(condition_text: &str, candidates: &[&'a str]) -> Vec<&'a str> {
    let lower = condition_text.to_lowercase();
    let allowed: &[&str] = if ["leg", "arm", "femoral", "extremity", "limb"].iter().any(|w| lower.contains(w)) {
        &["tourniquet", "pressure_dressing", "hemostatic_gauze", "blood_transfusion", "iv_access"]
    } else if ["chest", "thorax", "pneumothorax", "lung", "respiratory"].iter().any(|w| lower.contains(w)) {
        &["chest_tube", "pressure_dressing", "surgical_stabilization", "blood_transfusion", "iv_access", "morphine"]
    } else if ["abdomen", "abdominal", "gut", "intestinal"].iter().any(|w| lower.contains(w)) {
        &["pressure_dressing", "iv_access", "blood_transfusion", "surgical_stabilization", "antibiotics", "morphine"]
    } else if ["head", "skull", "brain", "cranial"].iter().any(|w| lower.contains(w)) {
        &["pressure_dressing", "iv_access", "morphine"]
    } else if lower.contains("hemorrhage") || lower.contains("bleeding") {
        &["pressure_dressing", "hemostatic_gauze", "blood_transfusion", "iv_access"]
    } else {
        return candidates.to_vec();
    };
    candidates.iter().filter(|c| allowed.contains(c)).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacking_has_diminishing_returns() {
        let catalog = TreatmentCatalog::standard();
        let one = stacked_deterioration_modifier(&catalog, &["tourniquet"]);
        let three = stacked_deterioration_modifier(&catalog, &["tourniquet", "iv_access", "morphine"]);
        assert!(three <= one);
        assert!(three >= 0.1);
    }

    #[test]
    fn region_filter_excludes_tourniquet_for_chest() {
        let candidates = ["tourniquet", "chest_tube", "morphine"];
        let filtered = region_filter("penetrating chest wound", &candidates);
        assert!(!filtered.contains(&"tourniquet"));
        assert!(filtered.contains(&"chest_tube"));
    }
}
