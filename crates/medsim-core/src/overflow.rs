//! C7 — Overflow Router
//!
//! Selects a destination facility per triage, capacity, load-balance, and
//! transport budget (spec.md 4.7). Holds only facility ids; all mutation
//! goes through `FacilityManager`, never a back-pointer.

use crate::facility::{FacilityManager, FacilityType};
use crate::patient::TriageCategory;
use medsim_common::FacilityId;
use std::collections::HashMap;

/// Maps each facility type to the concrete facility instance for this run.
/// One facility per echelon, matching spec.md 3's fixed-capacity model.
pub type FacilityDirectory = HashMap<FacilityType, FacilityId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteQueueReason {
    PreferredFull,
    AllFacilitiesFull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Routed { facility: FacilityType, bed: usize },
    Queued { facility: FacilityType, position: usize, priority: bool, reason: RouteQueueReason },
}

fn triage_preferences(category: TriageCategory) -> &'static [FacilityType] {
    use FacilityType::*;
    use TriageCategory::*;
    match category {
        T1 => &[Role2, Role3],
        T2 => &[Role1, Csu, Role2],
        T3 => &[Role1, Csu],
        T4 => &[Role1],
    }
}

const FALLBACK_ORDER: &[FacilityType] = &[FacilityType::Role1, FacilityType::Csu, FacilityType::Role2, FacilityType::Role3];

/// `route_patient(id, triage, priority?, constraints?)`.
pub fn route_patient(
    manager: &FacilityManager,
    directory: &FacilityDirectory,
    triage: TriageCategory,
    urgent: bool,
    max_transport_time_minutes: f64,
    transport_time: impl Fn(FacilityType) -> f64,
    admit: impl Fn(&FacilityId, bool) -> crate::facility::AdmitResult,
) -> RouteOutcome {
    let preferences = triage_preferences(triage);
    let first = preferences[0];

    if let Some(first_id) = directory.get(&first) {
        if let Some(snapshot) = manager.get(first_id) {
            let has_room = snapshot.occupancy < snapshot.capacity;
            let queue_ok = snapshot.priority_queue_len + snapshot.routine_queue_len < 5;
            let within_budget = transport_time(first) <= max_transport_time_minutes;
            if has_room && queue_ok && within_budget {
                return match admit(first_id, urgent) {
                    crate::facility::AdmitResult::Admitted { bed } => RouteOutcome::Routed { facility: first, bed },
                    crate::facility::AdmitResult::Queued { position, priority } => {
                        RouteOutcome::Queued { facility: first, position, priority, reason: RouteQueueReason::PreferredFull }
                    }
                };
            }
        }
    }

    let mut best: Option<(FacilityType, f64)> = None;
    for &candidate in FALLBACK_ORDER {
        let Some(id) = directory.get(&candidate) else { continue };
        let Some(snapshot) = manager.get(id) else { continue };
        if snapshot.occupancy >= snapshot.capacity {
            continue;
        }
        if snapshot.priority_queue_len + snapshot.routine_queue_len > 10 {
            continue;
        }
        if transport_time(candidate) > max_transport_time_minutes {
            continue;
        }
        let utilization = snapshot.occupancy as f64 / snapshot.capacity as f64;
        if best.map(|(_, u)| utilization < u).unwrap_or(true) {
            best = Some((candidate, utilization));
        }
    }

    if let Some((candidate, _)) = best {
        if let Some(id) = directory.get(&candidate) {
            if let crate::facility::AdmitResult::Admitted { bed } = admit(id, urgent) {
                return RouteOutcome::Routed { facility: candidate, bed };
            }
        }
    }

    // all full: enqueue at first preference regardless of its own gates
    if let Some(first_id) = directory.get(&first) {
        if let crate::facility::AdmitResult::Queued { position, priority } = admit(first_id, urgent) {
            return RouteOutcome::Queued { facility: first, position, priority, reason: RouteQueueReason::AllFacilitiesFull };
        }
    }

    RouteOutcome::Queued { facility: first, position: 0, priority: urgent, reason: RouteQueueReason::AllFacilitiesFull }
}

/// Mass-casualty routing order: T1, T2, T3, then expectant (T4) last;
/// T1 patients are always routed with `urgent = true`.
pub fn mass_casualty_order(category: TriageCategory) -> u8 {
    category.priority()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{Facility, FacilityType};
    use medsim_common::PatientId;

    fn directory(manager: &FacilityManager) -> FacilityDirectory {
        let mut dir = FacilityDirectory::new();
        for (facility_type, name) in [
            (FacilityType::Role1, "role1"),
            (FacilityType::Role2, "role2"),
            (FacilityType::Role3, "role3"),
            (FacilityType::Csu, "csu"),
        ] {
            let id = FacilityId::new(name);
            manager.register(Facility::new(id.clone(), facility_type));
            dir.insert(facility_type, id);
        }
        dir
    }

    #[test]
    fn t1_routes_to_role2_when_available() {
        let manager = FacilityManager::new();
        let dir = directory(&manager);
        let mut counter = 0;
        let outcome = route_patient(&manager, &dir, TriageCategory::T1, true, 120.0, |_| 20.0, |id, urgent| {
            counter += 1;
            manager.admit(id, PatientId::new(format!("p{counter}")), urgent).unwrap()
        });
        assert_eq!(outcome, RouteOutcome::Routed { facility: FacilityType::Role2, bed: 0 });
    }

    #[test]
    fn mass_casualty_order_prioritizes_t1() {
        assert!(mass_casualty_order(TriageCategory::T1) < mass_casualty_order(TriageCategory::T4));
    }
}
