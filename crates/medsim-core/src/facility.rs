//! C6 — Facility Capacity Manager
//!
//! Bed pools, priority + routine queues, admit/discharge/transfer
//! (spec.md 4.6). Outcomes are tagged variants, not ad-hoc dicts, per the
//! Design Notes.

use medsim_common::{FacilityId, PatientId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityType {
    Role1,
    Role2,
    Role3,
    Csu,
}

impl FacilityType {
    pub fn capacity(&self) -> usize {
        match self {
            FacilityType::Role1 => 20,
            FacilityType::Role2 => 60,
            FacilityType::Role3 => 200,
            FacilityType::Csu => 50,
        }
    }

    pub fn default_overflow_threshold(&self) -> f64 {
        match self {
            FacilityType::Role1 => 0.8,
            FacilityType::Role2 => 0.85,
            FacilityType::Role3 => 0.9,
            FacilityType::Csu => 0.85,
        }
    }
}

pub struct Facility {
    pub id: FacilityId,
    pub facility_type: FacilityType,
    pub capacity: usize,
    pub overflow_threshold: f64,
    pub admitted: HashSet<PatientId>,
    pub priority_queue: VecDeque<PatientId>,
    pub routine_queue: VecDeque<PatientId>,
}

impl Facility {
    pub fn new(id: FacilityId, facility_type: FacilityType) -> Self {
        Self {
            id,
            facility_type,
            capacity: facility_type.capacity(),
            overflow_threshold: facility_type.default_overflow_threshold(),
            admitted: HashSet::new(),
            priority_queue: VecDeque::new(),
            routine_queue: VecDeque::new(),
        }
    }

    pub fn occupancy(&self) -> usize {
        self.admitted.len()
    }

    pub fn utilization(&self) -> f64 {
        self.occupancy() as f64 / self.capacity as f64
    }

    pub fn queue_len(&self) -> usize {
        self.priority_queue.len() + self.routine_queue.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdmitResult {
    Admitted { bed: usize },
    Queued { position: usize, priority: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DischargeResult {
    Discharged,
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferResult {
    Transferred { bed: usize },
    TransferFailed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FacilityError {
    #[error("facility not found: {0}")]
    FacilityNotFound(FacilityId),
}

pub struct FacilityManager {
    facilities: RwLock<HashMap<FacilityId, Facility>>,
}

impl FacilityManager {
    pub fn new() -> Self {
        Self {
            facilities: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, facility: Facility) {
        self.facilities.write().insert(facility.id.clone(), facility);
    }

    /// Admission: append to the admitted set if there's room, else enqueue
    /// (priority queue for urgent, routine otherwise).
    pub fn admit(&self, facility_id: &FacilityId, patient: PatientId, urgent: bool) -> Result<AdmitResult, FacilityError> {
        let mut facilities = self.facilities.write();
        let facility = facilities
            .get_mut(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.clone()))?;

        if facility.occupancy() < facility.capacity {
            let bed = facility.occupancy();
            facility.admitted.insert(patient);
            Ok(AdmitResult::Admitted { bed })
        } else if urgent {
            facility.priority_queue.push_back(patient);
            Ok(AdmitResult::Queued {
                position: facility.priority_queue.len(),
                priority: true,
            })
        } else {
            facility.routine_queue.push_back(patient);
            Ok(AdmitResult::Queued {
                position: facility.routine_queue.len(),
                priority: false,
            })
        }
    }

    pub fn discharge(&self, facility_id: &FacilityId, patient: &PatientId) -> Result<DischargeResult, FacilityError> {
        let mut facilities = self.facilities.write();
        let facility = facilities
            .get_mut(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.clone()))?;

        if facility.admitted.remove(patient) {
            Ok(DischargeResult::Discharged)
        } else {
            Ok(DischargeResult::NotFound)
        }
    }

    /// Discharge-then-admit with rollback: on admit failure at the
    /// destination, the patient is re-admitted at the origin.
    pub fn transfer(
        &self,
        from: &FacilityId,
        to: &FacilityId,
        patient: PatientId,
        urgent: bool,
    ) -> Result<TransferResult, FacilityError> {
        let discharged = self.discharge(from, &patient)?;
        if discharged == DischargeResult::NotFound {
            return Ok(TransferResult::TransferFailed {
                reason: "patient not found at origin".to_string(),
            });
        }

        match self.admit(to, patient.clone(), urgent)? {
            AdmitResult::Admitted { bed } => Ok(TransferResult::Transferred { bed }),
            AdmitResult::Queued { .. } => {
                // roll back: re-admit at origin
                let _ = self.admit(from, patient, urgent)?;
                Ok(TransferResult::TransferFailed {
                    reason: "destination full, rolled back to origin".to_string(),
                })
            }
        }
    }

    /// Drains the priority queue first, then routine, while beds remain.
    pub fn process_queue(&self, facility_id: &FacilityId) -> Result<Vec<PatientId>, FacilityError> {
        let mut facilities = self.facilities.write();
        let facility = facilities
            .get_mut(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.clone()))?;

        let mut admitted = Vec::new();
        while facility.occupancy() < facility.capacity {
            let next = facility.priority_queue.pop_front().or_else(|| facility.routine_queue.pop_front());
            match next {
                Some(patient) => {
                    facility.admitted.insert(patient.clone());
                    admitted.push(patient);
                }
                None => break,
            }
        }
        Ok(admitted)
    }

    pub fn check_overflow_needed(&self, facility_id: &FacilityId) -> Result<bool, FacilityError> {
        let facilities = self.facilities.read();
        let facility = facilities
            .get(facility_id)
            .ok_or_else(|| FacilityError::FacilityNotFound(facility_id.clone()))?;
        Ok(facility.utilization() >= facility.overflow_threshold)
    }

    pub fn get(&self, facility_id: &FacilityId) -> Option<FacilitySnapshot> {
        self.facilities.read().get(facility_id).map(FacilitySnapshot::from)
    }

    pub fn facility_type_of(&self, facility_id: &FacilityId) -> Option<FacilityType> {
        self.facilities.read().get(facility_id).map(|f| f.facility_type)
    }
}

impl Default for FacilityManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view for callers that should not reach into the lock.
#[derive(Debug, Clone)]
pub struct FacilitySnapshot {
    pub id: FacilityId,
    pub facility_type: FacilityType,
    pub capacity: usize,
    pub occupancy: usize,
    pub priority_queue_len: usize,
    pub routine_queue_len: usize,
}

impl From<&Facility> for FacilitySnapshot {
    fn from(f: &Facility) -> Self {
        Self {
            id: f.id.clone(),
            facility_type: f.facility_type,
            capacity: f.capacity,
            occupancy: f.occupancy(),
            priority_queue_len: f.priority_queue.len(),
            routine_queue_len: f.routine_queue.len(),
        }
    }
}

/// Fixed overflow cascade: Role1->CSU->Role2, Role2->Role3, Role3->none, CSU->Role2->Role3.
pub fn overflow_recommendation(facility_type: FacilityType) -> Vec<FacilityType> {
    use FacilityType::*;
    match facility_type {
        Role1 => vec![Csu, Role2],
        Role2 => vec![Role3],
        Role3 => vec![],
        Csu => vec![Role2, Role3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(facility_type: FacilityType) -> (FacilityManager, FacilityId) {
        let manager = FacilityManager::new();
        let id = FacilityId::new("f1");
        manager.register(Facility::new(id.clone(), facility_type));
        (manager, id)
    }

    #[test]
    fn admits_until_capacity_then_queues() {
        let (manager, id) = manager_with(FacilityType::Role1);
        for i in 0..20 {
            let result = manager.admit(&id, PatientId::new(format!("p{i}")), false).unwrap();
            assert!(matches!(result, AdmitResult::Admitted { .. }));
        }
        let overflow = manager.admit(&id, PatientId::new("p20"), true).unwrap();
        assert_eq!(overflow, AdmitResult::Queued { position: 1, priority: true });
    }

    #[test]
    fn process_queue_drains_priority_before_routine() {
        let (manager, id) = manager_with(FacilityType::Role1);
        for i in 0..20 {
            manager.admit(&id, PatientId::new(format!("p{i}")), false).unwrap();
        }
        manager.admit(&id, PatientId::new("routine"), false).unwrap();
        manager.admit(&id, PatientId::new("urgent"), true).unwrap();
        manager.discharge(&id, &PatientId::new("p0")).unwrap();

        let admitted = manager.process_queue(&id).unwrap();
        assert_eq!(admitted, vec![PatientId::new("urgent")]);
    }

    #[test]
    fn transfer_rolls_back_on_full_destination() {
        let manager = FacilityManager::new();
        let origin = FacilityId::new("origin");
        let dest = FacilityId::new("dest");
        manager.register(Facility::new(origin.clone(), FacilityType::Role1));
        manager.register(Facility::new(dest.clone(), FacilityType::Role1));

        let patient = PatientId::new("p1");
        manager.admit(&origin, patient.clone(), false).unwrap();
        for i in 0..20 {
            manager.admit(&dest, PatientId::new(format!("d{i}")), false).unwrap();
        }

        let result = manager.transfer(&origin, &dest, patient.clone(), false).unwrap();
        assert!(matches!(result, TransferResult::TransferFailed { .. }));
        assert!(manager.get(&origin).unwrap().occupancy == 1);
    }

    #[test]
    fn overflow_cascade_matches_fixed_table() {
        assert_eq!(overflow_recommendation(FacilityType::Role3), Vec::<FacilityType>::new());
        assert_eq!(overflow_recommendation(FacilityType::Role1), vec![FacilityType::Csu, FacilityType::Role2]);
    }
}
