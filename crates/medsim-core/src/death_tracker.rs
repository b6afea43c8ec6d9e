//! C10 — Death Tracker
//!
//! Categorizes and records deaths, and derives preventability and mortality
//! statistics (spec.md 4.10).

use crate::patient::InjuryType;
use medsim_common::{PatientId, SimInstant};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCategory {
    /// Battle injury, died at the point of injury.
    Kia,
    /// Battle injury, died after reaching any echelon of care.
    Dow,
    /// Non-battle injury.
    NonBattleDeath,
    /// Disease.
    Dnb,
}

/// `categorize_death(injury_type, location)`: disease is always DNB;
/// non-battle injury is always a non-battle death; battle injury is KIA
/// only at the point of injury, DOW everywhere past it.
pub fn categorize_death(injury_type: InjuryType, location: &str) -> DeathCategory {
    match injury_type {
        InjuryType::Disease => DeathCategory::Dnb,
        InjuryType::NonBattle => DeathCategory::NonBattleDeath,
        InjuryType::Battle => {
            if location.eq_ignore_ascii_case("poi") {
                DeathCategory::Kia
            } else {
                DeathCategory::Dow
            }
        }
    }
}

/// `determine_preventability(initial_health, time_of_death, treatments_received)`:
/// a death is preventable only when the patient started viable (>=20 health),
/// died within the platinum hour, and received no treatment before dying —
/// i.e. the system had both the chance and the time to save them and didn't.
pub fn determine_preventability(initial_health: f64, time_of_death: SimInstant, treatments_received: usize) -> bool {
    if initial_health < 20.0 {
        return false;
    }
    if time_of_death.as_minutes() > 60 {
        return false;
    }
    treatments_received == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathRecord {
    pub patient_id: PatientId,
    pub time_of_death: SimInstant,
    pub location: String,
    pub category: DeathCategory,
    pub injury_type: InjuryType,
    pub initial_health: f64,
    pub final_health: f64,
    pub preventable: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeathStatistics {
    pub total_deaths: u64,
    pub kia: u64,
    pub dow: u64,
    pub non_battle_deaths: u64,
    pub dnb: u64,
    pub preventable_deaths: u64,
}

impl DeathStatistics {
    /// Preventable deaths as a fraction of all recorded deaths; 0 when
    /// nobody has died yet rather than dividing by zero.
    pub fn mortality_rate(&self) -> f64 {
        if self.total_deaths == 0 {
            0.0
        } else {
            self.preventable_deaths as f64 / self.total_deaths as f64
        }
    }
}

#[derive(Default)]
pub struct DeathTracker {
    records: Vec<DeathRecord>,
}

impl DeathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `track_death(patient_id, time_of_death, location, injury_type,
    /// initial_health, final_health, treatments_received)`.
    pub fn track_death(
        &mut self,
        patient_id: PatientId,
        time_of_death: SimInstant,
        location: &str,
        injury_type: InjuryType,
        initial_health: f64,
        final_health: f64,
        treatments_received: usize,
    ) -> DeathRecord {
        let category = categorize_death(injury_type, location);
        let preventable = determine_preventability(initial_health, time_of_death, treatments_received);
        let record = DeathRecord {
            patient_id,
            time_of_death,
            location: location.to_string(),
            category,
            injury_type,
            initial_health,
            final_health,
            preventable,
        };
        self.records.push(record.clone());
        record
    }

    pub fn records(&self) -> &[DeathRecord] {
        &self.records
    }

    pub fn statistics(&self) -> DeathStatistics {
        let mut stats = DeathStatistics::default();
        for record in &self.records {
            stats.total_deaths += 1;
            match record.category {
                DeathCategory::Kia => stats.kia += 1,
                DeathCategory::Dow => stats.dow += 1,
                DeathCategory::NonBattleDeath => stats.non_battle_deaths += 1,
                DeathCategory::Dnb => stats.dnb += 1,
            }
            if record.preventable {
                stats.preventable_deaths += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battle_death_at_poi_is_kia() {
        assert_eq!(categorize_death(InjuryType::Battle, "poi"), DeathCategory::Kia);
        assert_eq!(categorize_death(InjuryType::Battle, "role1"), DeathCategory::Dow);
    }

    #[test]
    fn disease_death_is_always_dnb() {
        assert_eq!(categorize_death(InjuryType::Disease, "poi"), DeathCategory::Dnb);
    }

    #[test]
    fn preventability_requires_viable_start_fast_death_and_no_treatment() {
        assert!(!determine_preventability(10.0, SimInstant::from_minutes(5), 0));
        assert!(!determine_preventability(50.0, SimInstant::from_minutes(90), 0));
        assert!(!determine_preventability(50.0, SimInstant::from_minutes(5), 1));
        assert!(determine_preventability(50.0, SimInstant::from_minutes(5), 0));
    }

    #[test]
    fn statistics_aggregate_across_records() {
        let mut tracker = DeathTracker::new();
        tracker.track_death(PatientId::new("p1"), SimInstant::from_minutes(5), "poi", InjuryType::Battle, 80.0, 0.0, 0);
        tracker.track_death(PatientId::new("p2"), SimInstant::from_minutes(200), "role2", InjuryType::Battle, 40.0, 0.0, 2);
        let stats = tracker.statistics();
        assert_eq!(stats.total_deaths, 2);
        assert_eq!(stats.kia, 1);
        assert_eq!(stats.dow, 1);
        assert_eq!(stats.preventable_deaths, 1);
        assert_eq!(stats.mortality_rate(), 0.5);
    }
}
