//! C9 — CSU Batch Coordinator
//!
//! Accumulates patients into batches, prioritizes, and releases to
//! transport (spec.md 4.9).

use crate::facility::{FacilityManager, FacilityType, TransferResult};
use crate::patient::TriageCategory;
use medsim_common::{FacilityId, PatientId, SimInstant};
use parking_lot::RwLock;

pub const BATCH_SIZE: usize = 10;
pub const MAX_HOLD_MINUTES: u64 = 60;

struct PendingEntry {
    patient_id: PatientId,
    triage: TriageCategory,
}

pub struct CsuBatchCoordinator {
    csu_id: FacilityId,
    pending: RwLock<Vec<PendingEntry>>,
    first_added_at: RwLock<Option<SimInstant>>,
    metrics: RwLock<BatchMetrics>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchMetrics {
    pub total_batches: u64,
    pub full_batches: u64,
    pub partial_batches: u64,
    pub patients_transferred: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub batch_count: usize,
    pub batch_ready: bool,
}

#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    pub patient_ids: Vec<PatientId>,
    pub destination: FacilityType,
    pub transport_required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    Transferred { transferred_count: usize },
    BatchNotReady,
    InsufficientCapacity,
}

impl CsuBatchCoordinator {
    pub fn new(csu_id: FacilityId) -> Self {
        Self {
            csu_id,
            pending: RwLock::new(Vec::new()),
            first_added_at: RwLock::new(None),
            metrics: RwLock::new(BatchMetrics::default()),
        }
    }

    /// `add(id, triage)`.
    pub fn add(&self, now: SimInstant, patient_id: PatientId, triage: TriageCategory) -> AddOutcome {
        let mut pending = self.pending.write();
        if pending.is_empty() {
            *self.first_added_at.write() = Some(now);
        }
        pending.push(PendingEntry { patient_id, triage });

        let hold_duration = self.first_added_at.read().map(|start| (now - start).as_minutes()).unwrap_or(0);
        let batch_ready = pending.len() >= BATCH_SIZE || hold_duration >= MAX_HOLD_MINUTES;

        AddOutcome {
            batch_count: pending.len(),
            batch_ready,
        }
    }

    pub fn is_batch_ready(&self, now: SimInstant) -> bool {
        let pending = self.pending.read();
        if pending.is_empty() {
            return false;
        }
        let hold_duration = self.first_added_at.read().map(|start| (now - start).as_minutes()).unwrap_or(0);
        pending.len() >= BATCH_SIZE || hold_duration >= MAX_HOLD_MINUTES
    }

    /// `prepare_transfer`: sorted by triage priority, destination recommended
    /// by capacity/utilization.
    pub fn prepare_transfer(&self, manager: &FacilityManager, role2: &FacilityId, role3: &FacilityId) -> PreparedTransfer {
        let mut pending = self.pending.write();
        pending.sort_by_key(|e| e.triage.priority());
        let patient_ids: Vec<PatientId> = pending.iter().map(|e| e.patient_id.clone()).collect();

        let destination = self
            .recommend_destination(manager, role2, role3)
            .unwrap_or(FacilityType::Role2);

        PreparedTransfer {
            patient_ids,
            destination,
            transport_required: true,
        }
    }

    fn recommend_destination(&self, manager: &FacilityManager, role2: &FacilityId, role3: &FacilityId) -> Option<FacilityType> {
        let batch_len = self.pending.read().len().max(1);
        if let Some(snapshot) = manager.get(role2) {
            let free_beds = snapshot.capacity.saturating_sub(snapshot.occupancy);
            if free_beds >= batch_len && snapshot.occupancy as f64 / snapshot.capacity as f64 < 0.9 {
                return Some(FacilityType::Role2);
            }
        }
        if manager.get(role3).is_some() {
            return Some(FacilityType::Role3);
        }
        Some(FacilityType::Role2)
    }

    /// `execute(destination, force?)`.
    pub fn execute(&self, manager: &FacilityManager, now: SimInstant, destination_id: &FacilityId, force: bool) -> ExecuteOutcome {
        if !force && !self.is_batch_ready(now) {
            return ExecuteOutcome::BatchNotReady;
        }

        let batch_len = self.pending.read().len();
        if batch_len == 0 {
            return ExecuteOutcome::BatchNotReady;
        }

        let has_capacity = manager
            .get(destination_id)
            .map(|s| s.capacity.saturating_sub(s.occupancy) >= batch_len)
            .unwrap_or(false);
        if !has_capacity {
            return ExecuteOutcome::InsufficientCapacity;
        }

        let mut transferred = 0usize;
        let patients: Vec<PatientId> = self.pending.write().drain(..).map(|e| e.patient_id).collect();
        for patient_id in patients {
            if let Ok(TransferResult::Transferred { .. }) = manager.transfer(&self.csu_id, destination_id, patient_id, false) {
                transferred += 1;
            }
        }

        *self.first_added_at.write() = None;

        let mut metrics = self.metrics.write();
        metrics.total_batches += 1;
        if transferred == BATCH_SIZE {
            metrics.full_batches += 1;
        } else {
            metrics.partial_batches += 1;
        }
        metrics.patients_transferred += transferred as u64;

        ExecuteOutcome::Transferred { transferred_count: transferred }
    }

    pub fn batch_metrics(&self) -> BatchMetrics {
        *self.metrics.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::Facility;
    use medsim_common::SimDuration;

    #[test]
    fn batch_ready_at_ten_patients() {
        let csu = CsuBatchCoordinator::new(FacilityId::new("csu"));
        let mut now = SimInstant::ZERO;
        let mut outcome = AddOutcome { batch_count: 0, batch_ready: false };
        for i in 0..10 {
            outcome = csu.add(now, PatientId::new(format!("p{i}")), TriageCategory::T2);
            now += SimDuration::minutes(1);
        }
        assert_eq!(outcome, AddOutcome { batch_count: 10, batch_ready: true });
    }

    #[test]
    fn execute_full_batch_transfers_all() {
        let manager = FacilityManager::new();
        let csu_id = FacilityId::new("csu");
        let role2_id = FacilityId::new("role2");
        manager.register(Facility::new(csu_id.clone(), FacilityType::Csu));
        manager.register(Facility::new(role2_id.clone(), FacilityType::Role2));

        let coordinator = CsuBatchCoordinator::new(csu_id.clone());
        let mut now = SimInstant::ZERO;
        for i in 0..10 {
            manager.admit(&csu_id, PatientId::new(format!("p{i}")), false).unwrap();
            coordinator.add(now, PatientId::new(format!("p{i}")), TriageCategory::T2);
            now += SimDuration::minutes(1);
        }

        let outcome = coordinator.execute(&manager, now, &role2_id, false);
        assert_eq!(outcome, ExecuteOutcome::Transferred { transferred_count: 10 });
        assert_eq!(manager.get(&csu_id).unwrap().occupancy, 0);
        assert_eq!(manager.get(&role2_id).unwrap().occupancy, 10);
        assert_eq!(coordinator.batch_metrics().full_batches, 1);
    }
}
