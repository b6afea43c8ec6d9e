//! C8 — Transport Scheduler
//!
//! Vehicle pools, trip scheduling, queueing, completion, and
//! deterioration-risk classification (spec.md 4.8).

use medsim_common::{MissionId, PatientId, SimInstant};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleKind {
    GroundAmbulance,
    AirAmbulance,
    Bus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPriority {
    Urgent,
    Routine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    Queued,
    Scheduled,
    InTransit,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeteriorationRisk {
    Low,
    Moderate,
    High,
}

/// `high if health<20 and duration>30; moderate if health<40 or duration>45; else low`.
pub fn classify_deterioration_risk(health: f64, duration_minutes: f64) -> DeteriorationRisk {
    if health < 20.0 && duration_minutes > 30.0 {
        DeteriorationRisk::High
    } else if health < 40.0 || duration_minutes > 45.0 {
        DeteriorationRisk::Moderate
    } else {
        DeteriorationRisk::Low
    }
}

#[derive(Debug, Clone)]
pub struct TransportMission {
    pub id: MissionId,
    pub patient_id: PatientId,
    pub origin: String,
    pub destination: String,
    pub vehicle_kind: VehicleKind,
    pub scheduled_at: SimInstant,
    pub duration_minutes: f64,
    pub estimated_arrival: SimInstant,
    pub status: MissionStatus,
    pub priority: TransportPriority,
    pub deterioration_risk: DeteriorationRisk,
}

#[derive(Debug, Clone, Copy)]
struct VehiclePool {
    total: u32,
    available: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    Scheduled(MissionId),
    Queued { position: usize, priority: bool },
}

struct QueuedRequest {
    patient_id: PatientId,
    origin: String,
    destination: String,
    priority: TransportPriority,
    health: f64,
}

pub struct TransportScheduler {
    pools: RwLock<HashMap<VehicleKind, VehiclePool>>,
    route_table: HashMap<(String, String), f64>,
    air_speed_multiplier: f64,
    active: RwLock<HashMap<MissionId, TransportMission>>,
    priority_queue: RwLock<VecDeque<QueuedRequest>>,
    routine_queue: RwLock<VecDeque<QueuedRequest>>,
    completed_count: RwLock<u64>,
    died_in_transit_count: RwLock<u64>,
}

impl TransportScheduler {
    pub fn new(route_table: HashMap<(String, String), f64>) -> Self {
        let mut pools = HashMap::new();
        pools.insert(VehicleKind::GroundAmbulance, VehiclePool { total: 40, available: 40 });
        pools.insert(VehicleKind::AirAmbulance, VehiclePool { total: 4, available: 4 });
        pools.insert(VehicleKind::Bus, VehiclePool { total: 6, available: 6 });
        Self {
            pools: RwLock::new(pools),
            route_table,
            air_speed_multiplier: 0.33,
            active: RwLock::new(HashMap::new()),
            priority_queue: RwLock::new(VecDeque::new()),
            routine_queue: RwLock::new(VecDeque::new()),
            completed_count: RwLock::new(0),
            died_in_transit_count: RwLock::new(0),
        }
    }

    fn ground_duration(&self, origin: &str, destination: &str) -> f64 {
        self.route_table
            .get(&(origin.to_string(), destination.to_string()))
            .copied()
            .unwrap_or(30.0)
    }

    /// `schedule(patient_id, from, to, priority, health?) -> mission`.
    pub fn schedule(
        &self,
        now: SimInstant,
        patient_id: PatientId,
        origin: &str,
        destination: &str,
        priority: TransportPriority,
        health: f64,
    ) -> ScheduleOutcome {
        let ground_duration = self.ground_duration(origin, destination);
        let air_duration = ground_duration * self.air_speed_multiplier;

        let mut pools = self.pools.write();
        let air_available = pools.get(&VehicleKind::AirAmbulance).map(|p| p.available > 0).unwrap_or(false);
        let use_air = (priority == TransportPriority::Urgent || ground_duration > 30.0) && air_available;

        let (kind, duration) = if use_air {
            (VehicleKind::AirAmbulance, air_duration)
        } else {
            (VehicleKind::GroundAmbulance, ground_duration)
        };

        let pool = pools.get_mut(&kind).expect("configured vehicle kind");
        if pool.available > 0 {
            pool.available -= 1;
            drop(pools);

            let id = MissionId::new();
            let mission = TransportMission {
                id,
                patient_id,
                origin: origin.to_string(),
                destination: destination.to_string(),
                vehicle_kind: kind,
                scheduled_at: now,
                duration_minutes: duration,
                estimated_arrival: now + medsim_common::SimDuration::minutes(duration.round() as u64),
                status: MissionStatus::Scheduled,
                priority,
                deterioration_risk: classify_deterioration_risk(health, duration),
            };
            self.active.write().insert(id, mission);
            ScheduleOutcome::Scheduled(id)
        } else {
            drop(pools);
            let request = QueuedRequest {
                patient_id,
                origin: origin.to_string(),
                destination: destination.to_string(),
                priority,
                health,
            };
            let position = if priority == TransportPriority::Urgent {
                let mut q = self.priority_queue.write();
                q.push_back(request);
                q.len()
            } else {
                let mut q = self.routine_queue.write();
                q.push_back(request);
                q.len()
            };
            ScheduleOutcome::Queued { position, priority: priority == TransportPriority::Urgent }
        }
    }

    /// Returns the vehicle, tallies the outcome, and activates queued
    /// requests priority-first while the vehicle class is free.
    pub fn complete(&self, now: SimInstant, mission_id: MissionId, died_in_transit: bool) -> Option<TransportMission> {
        let mission = self.active.write().remove(&mission_id)?;
        {
            let mut pools = self.pools.write();
            if let Some(pool) = pools.get_mut(&mission.vehicle_kind) {
                pool.available += 1;
            }
        }
        if died_in_transit {
            *self.died_in_transit_count.write() += 1;
        } else {
            *self.completed_count.write() += 1;
        }

        self.process_queue(now);

        let mut finished = mission;
        finished.status = MissionStatus::Completed;
        Some(finished)
    }

    fn process_queue(&self, now: SimInstant) {
        loop {
            let has_priority = !self.priority_queue.read().is_empty();
            let request = if has_priority {
                self.priority_queue.write().pop_front()
            } else {
                self.routine_queue.write().pop_front()
            };
            let Some(request) = request else { break };

            match self.schedule(now, request.patient_id, &request.origin, &request.destination, request.priority, request.health) {
                ScheduleOutcome::Scheduled(_) => continue,
                ScheduleOutcome::Queued { .. } => {
                    // no vehicle freed up after all; put it back at the front and stop
                    if request.priority == TransportPriority::Urgent {
                        self.priority_queue.write().push_front(request);
                    } else {
                        self.routine_queue.write().push_front(request);
                    }
                    break;
                }
            }
        }
    }

    /// `schedule_batch(patients, from, to)`: one bus for up to 10 patients.
    pub fn schedule_batch(&self, now: SimInstant, patient_ids: &[PatientId], origin: &str, destination: &str) -> ScheduleOutcome {
        debug_assert!(patient_ids.len() <= 10, "bus batches are capped at 10 patients");
        let duration = self.ground_duration(origin, destination);
        let mut pools = self.pools.write();
        let pool = pools.get_mut(&VehicleKind::Bus).expect("bus pool configured");
        if pool.available > 0 {
            pool.available -= 1;
            drop(pools);
            let id = MissionId::new();
            let mission = TransportMission {
                id,
                patient_id: patient_ids.first().cloned().unwrap_or_else(|| PatientId::new("batch")),
                origin: origin.to_string(),
                destination: destination.to_string(),
                vehicle_kind: VehicleKind::Bus,
                scheduled_at: now,
                duration_minutes: duration,
                estimated_arrival: now + medsim_common::SimDuration::minutes(duration.round() as u64),
                status: MissionStatus::Scheduled,
                priority: TransportPriority::Routine,
                deterioration_risk: DeteriorationRisk::Low,
            };
            self.active.write().insert(id, mission);
            ScheduleOutcome::Scheduled(id)
        } else {
            ScheduleOutcome::Queued { position: 0, priority: false }
        }
    }

    /// `available + in_use = total` per vehicle class (invariant 3).
    pub fn pool_counts(&self, kind: VehicleKind) -> (u32, u32) {
        let pools = self.pools.read();
        let pool = pools.get(&kind).copied().unwrap_or(VehiclePool { total: 0, available: 0 });
        (pool.available, pool.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> TransportScheduler {
        let mut routes = HashMap::new();
        routes.insert(("poi".to_string(), "role1".to_string()), 20.0);
        TransportScheduler::new(routes)
    }

    #[test]
    fn urgent_patient_uses_air_when_available() {
        let scheduler = scheduler();
        let outcome = scheduler.schedule(SimInstant::ZERO, PatientId::new("p1"), "poi", "role1", TransportPriority::Urgent, 50.0);
        assert!(matches!(outcome, ScheduleOutcome::Scheduled(_)));
        let (available, total) = scheduler.pool_counts(VehicleKind::AirAmbulance);
        assert_eq!(total, 4);
        assert_eq!(available, 3);
    }

    #[test]
    fn vehicle_invariant_holds_after_complete() {
        let scheduler = scheduler();
        let outcome = scheduler.schedule(SimInstant::ZERO, PatientId::new("p1"), "poi", "role1", TransportPriority::Routine, 80.0);
        let ScheduleOutcome::Scheduled(mission_id) = outcome else { panic!("expected scheduled mission") };
        scheduler.complete(SimInstant::ZERO, mission_id, false);
        let (available, total) = scheduler.pool_counts(VehicleKind::GroundAmbulance);
        assert_eq!(available, total);
    }

    #[test]
    fn deterioration_risk_classification() {
        assert_eq!(classify_deterioration_risk(15.0, 40.0), DeteriorationRisk::High);
        assert_eq!(classify_deterioration_risk(35.0, 10.0), DeteriorationRisk::Moderate);
        assert_eq!(classify_deterioration_risk(80.0, 10.0), DeteriorationRisk::Low);
    }
}
