//! C4 — Treatment Protocols
//!
//! Static catalog keyed by condition code, holding the facility-level
//! treatment permissions spec.md 4.4 describes.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityLevel {
    Poi,
    Role1,
    Role2,
    Role3,
    Csu,
}

pub struct ProtocolEntry {
    pub condition_code: &'static str,
    pub categories: &'static [&'static str],
    pub primary: &'static [(FacilityLevel, &'static [&'static str])],
    pub secondary: &'static [(FacilityLevel, &'static [&'static str])],
    pub contraindicated: &'static [&'static str],
    pub critical_window_minutes: Option<u32>,
    pub notes: &'static str,
}

impl ProtocolEntry {
    fn primary_for(&self, facility: FacilityLevel) -> Vec<&'static str> {
        self.primary
            .iter()
            .find(|(f, _)| std::mem::discriminant(f) == std::mem::discriminant(&facility))
            .map(|(_, list)| list.to_vec())
            .unwrap_or_default()
    }

    fn secondary_for(&self, facility: FacilityLevel) -> Vec<&'static str> {
        self.secondary
            .iter()
            .find(|(f, _)| std::mem::discriminant(f) == std::mem::discriminant(&facility))
            .map(|(_, list)| list.to_vec())
            .unwrap_or_default()
    }
}

pub fn standard_catalog() -> Vec<ProtocolEntry> {
    use FacilityLevel::*;
    vec![
        ProtocolEntry {
            condition_code: "traumatic_amputation",
            categories: &["hemorrhage", "trauma"],
            primary: &[
                (Poi, &["tourniquet", "pressure_dressing"]),
                (Role1, &["tourniquet", "iv_access", "morphine"]),
                (Role2, &["blood_transfusion", "surgical_stabilization"]),
                (Role3, &["major_surgery"]),
            ],
            secondary: &[(Role2, &["antibiotics"]), (Role3, &["organ_repair"])],
            contraindicated: &[],
            critical_window_minutes: Some(10),
            notes: "Platinum-10 hemorrhage control takes priority over all else.",
        },
        ProtocolEntry {
            condition_code: "tension_pneumothorax",
            categories: &["respiratory", "trauma"],
            primary: &[
                (Poi, &["needle_decompression"]),
                (Role1, &["needle_decompression", "iv_access"]),
                (Role2, &["chest_tube", "surgical_stabilization"]),
                (Role3, &["major_surgery"]),
            ],
            secondary: &[(Role2, &["blood_transfusion"])],
            contraindicated: &["tourniquet"],
            critical_window_minutes: Some(10),
            notes: "Tourniquet never indicated for chest injuries.",
        },
        ProtocolEntry {
            condition_code: "arterial_hemorrhage",
            categories: &["hemorrhage"],
            primary: &[
                (Poi, &["tourniquet", "hemostatic_gauze"]),
                (Role1, &["tourniquet", "iv_access"]),
                (Role2, &["blood_transfusion", "surgical_stabilization"]),
                (Role3, &["major_surgery"]),
            ],
            secondary: &[(Role1, &["antibiotics"])],
            contraindicated: &[],
            critical_window_minutes: Some(10),
            notes: "",
        },
        ProtocolEntry {
            condition_code: "penetrating_abdominal_trauma",
            categories: &["trauma", "abdominal"],
            primary: &[
                (Poi, &["pressure_dressing"]),
                (Role1, &["iv_access", "morphine"]),
                (Role2, &["surgical_stabilization", "blood_transfusion"]),
                (Role3, &["major_surgery", "organ_repair"]),
            ],
            secondary: &[(Role1, &["antibiotics"])],
            contraindicated: &["tourniquet"],
            critical_window_minutes: Some(60),
            notes: "",
        },
        ProtocolEntry {
            condition_code: "traumatic_brain_injury",
            categories: &["neuro", "trauma"],
            primary: &[
                (Poi, &["pressure_dressing"]),
                (Role1, &["iv_access"]),
                (Role2, &["surgical_stabilization"]),
                (Role3, &["major_surgery"]),
            ],
            secondary: &[],
            contraindicated: &["tourniquet"],
            critical_window_minutes: Some(60),
            notes: "Field treatment options are intentionally limited.",
        },
        ProtocolEntry {
            condition_code: "combat_stress_reaction",
            categories: &["psychological"],
            primary: &[
                (Poi, &["psychological_first_aid"]),
                (Role1, &["psychological_first_aid"]),
                (Role2, &["psychological_first_aid"]),
                (Role3, &["psychological_first_aid"]),
            ],
            secondary: &[],
            contraindicated: &["tourniquet", "blood_transfusion"],
            critical_window_minutes: None,
            notes: "",
        },
        ProtocolEntry {
            condition_code: "dehydration",
            categories: &["disease", "non_battle"],
            primary: &[
                (Poi, &["oral_rehydration"]),
                (Role1, &["iv_access", "oral_rehydration"]),
                (Role2, &["iv_access"]),
                (Role3, &["iv_access"]),
            ],
            secondary: &[],
            contraindicated: &["tourniquet"],
            critical_window_minutes: None,
            notes: "",
        },
        ProtocolEntry {
            condition_code: "closed_fracture",
            categories: &["trauma", "orthopedic"],
            primary: &[
                (Poi, &["pressure_dressing"]),
                (Role1, &["morphine", "iv_access"]),
                (Role2, &["surgical_stabilization"]),
                (Role3, &["surgical_stabilization"]),
            ],
            secondary: &[(Role1, &["antibiotics"])],
            contraindicated: &[],
            critical_window_minutes: None,
            notes: "",
        },
    ]
}

/// Life-saving interventions reorder to the front inside the critical
/// window, in this fixed precedence.
pub const CRITICAL_PRIORITY_ORDER: &[&str] = &[
    "tourniquet",
    "airway_positioning",
    "needle_decompression",
    "pressure_dressing",
    "hemostatic_gauze",
    "iv_access",
    "blood_transfusion",
    "damage_control_surgery",
    "intubation",
];

/// Anatomical constraints: a treatment is valid only for listed regions, or
/// for any region if it has no entry here.
fn body_part_allowed(treatment: &str, body_part: &str) -> bool {
    let region = body_part.to_lowercase();
    match treatment {
        "tourniquet" => ["leg", "arm", "extremity", "limb"].iter().any(|r| region.contains(r)),
        "chest_tube" | "needle_decompression" => ["chest", "thorax"].iter().any(|r| region.contains(r)),
        "major_surgery" if region.contains("head") => false, // craniotomy is a distinct procedure, not general surgery
        _ => true,
    }
}

fn generic_treatments(facility: FacilityLevel) -> Vec<&'static str> {
    use FacilityLevel::*;
    match facility {
        Poi => vec!["pressure_dressing"],
        Role1 => vec!["pressure_dressing", "iv_access", "morphine"],
        Role2 => vec!["iv_access", "surgical_stabilization"],
        Role3 => vec!["surgical_stabilization", "major_surgery"],
        Csu => vec!["pressure_dressing", "iv_access"],
    }
}

/// `get_appropriate(code, facility, severity, elapsed, body_part?) -> ordered list`.
pub fn get_appropriate(
    catalog: &[ProtocolEntry],
    condition_code: &str,
    facility: FacilityLevel,
    severity: u8,
    elapsed_minutes: f64,
    body_part: Option<&str>,
) -> Vec<String> {
    let entry = catalog.iter().find(|e| e.condition_code == condition_code);

    let mut list: Vec<&str> = match entry {
        Some(e) => {
            let mut primary = e.primary_for(facility);
            if severity >= 7 {
                primary.extend(e.secondary_for(facility));
            }
            primary.retain(|t| !e.contraindicated.contains(t));
            primary
        }
        None => generic_treatments(facility),
    };

    if let Some(bp) = body_part {
        list.retain(|t| body_part_allowed(t, bp));
    }

    // de-dup, preserving first occurrence
    let mut seen = std::collections::HashSet::new();
    list.retain(|t| seen.insert(*t));

    let within_window = entry
        .and_then(|e| e.critical_window_minutes)
        .map(|w| elapsed_minutes <= w as f64)
        .unwrap_or(false);

    if within_window {
        reorder_for_critical_window(&mut list);
    }

    list.into_iter().map(String::from).collect()
}

fn reorder_for_critical_window(list: &mut Vec<&str>) {
    let mut ordered: Vec<&str> = CRITICAL_PRIORITY_ORDER.iter().filter(|t| list.contains(t)).copied().collect();
    let remainder: Vec<&str> = list.iter().filter(|t| !ordered.contains(t)).copied().collect();
    ordered.extend(remainder);
    *list = ordered;
}

/// Validates a proposed treatment combination has no internal contradiction
/// (e.g. a contraindicated treatment alongside the treatment it contraindicates).
pub fn validate_combination(catalog: &[ProtocolEntry], condition_code: &str, treatments: &[String]) -> Result<(), String> {
    if let Some(entry) = catalog.iter().find(|e| e.condition_code == condition_code) {
        for t in treatments {
            if entry.contraindicated.contains(&t.as_str()) {
                return Err(format!("{t} is contraindicated for {condition_code}"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contraindicated_treatment_never_returned() {
        let catalog = standard_catalog();
        let list = get_appropriate(&catalog, "tension_pneumothorax", FacilityLevel::Role1, 8, 5.0, None);
        assert!(!list.contains(&"tourniquet".to_string()));
    }

    #[test]
    fn critical_window_reorders_tourniquet_first() {
        let catalog = standard_catalog();
        let list = get_appropriate(&catalog, "traumatic_amputation", FacilityLevel::Poi, 8, 5.0, None);
        assert_eq!(list.first().map(String::as_str), Some("tourniquet"));
    }

    #[test]
    fn body_part_mismatch_drops_tourniquet() {
        let catalog = standard_catalog();
        let list = get_appropriate(&catalog, "arterial_hemorrhage", FacilityLevel::Poi, 8, 5.0, Some("chest"));
        assert!(!list.contains(&"tourniquet".to_string()));
    }

    #[test]
    fn severe_cases_pull_in_secondary_treatments() {
        let catalog = standard_catalog();
        let mild = get_appropriate(&catalog, "closed_fracture", FacilityLevel::Role1, 3, 200.0, None);
        let severe = get_appropriate(&catalog, "closed_fracture", FacilityLevel::Role1, 8, 200.0, None);
        assert!(severe.len() >= mild.len());
    }
}
