//! The central entity: a casualty moving through the evacuation chain.

use medsim_common::{FacilityId, MissionId, PatientId, SimInstant};
use serde::{Deserialize, Serialize};

/// Battle / non-battle / disease, per spec.md 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjuryType {
    Battle,
    NonBattle,
    Disease,
}

/// Ordinal severity 1-10 bucketed into four bands for rate-table lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityBand {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl SeverityBand {
    /// Same bucket boundaries as the health-score engine's ordinal fallback
    /// (spec.md 4.2): 9-10 critical, 7-8 severe, 4-6 moderate, else mild.
    pub fn from_ordinal(severity: u8) -> Self {
        match severity {
            9..=10 => SeverityBand::Critical,
            7..=8 => SeverityBand::Severe,
            4..=6 => SeverityBand::Moderate,
            _ => SeverityBand::Mild,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriageCategory {
    T1,
    T2,
    T3,
    T4,
}

impl TriageCategory {
    /// 1..4, ascending urgency — used as the primary sort key in
    /// `triage::prioritize` (spec.md 4.5 and invariant 7).
    pub fn priority(&self) -> u8 {
        match self {
            TriageCategory::T1 => 1,
            TriageCategory::T2 => 2,
            TriageCategory::T3 => 3,
            TriageCategory::T4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientState {
    AtPoi,
    InTriage,
    InTreatment,
    InTransport,
    InQueue,
    Transferred,
    Evacuated,
    Died,
    Discharged,
}

impl PatientState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PatientState::Died | PatientState::Discharged | PatientState::Evacuated
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    Injured,
    Triaged,
    TreatmentApplied,
    TransportScheduled,
    TransportCompleted,
    Admitted,
    Queued,
    Discharged,
    Died,
    Evacuated,
    DiagnosisUpdated,
}

/// One append-only timeline entry. Timelines are monotonically
/// non-decreasing in timestamp (invariant 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub at: SimInstant,
    pub kind: EventKind,
    pub location: String,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub name: String,
    pub applied_at: SimInstant,
    /// Open Question (a): recorded as current_health minus the treatment's
    /// effect at the moment of application, which can go negative for large
    /// boosts on low-health patients. Preserved verbatim rather than
    /// clamped, so the before/after pair is auditable; only `current_health`
    /// on the patient itself is clamped to [0,100].
    pub health_before: f64,
    pub health_after: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub facility: FacilityId,
    pub diagnosed_code: String,
    pub confidence: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub injury_type: InjuryType,
    pub severity: u8,
    pub body_part: Option<String>,
    pub true_condition_code: Option<String>,
    pub initial_health: f64,
    pub current_health: f64,
    pub triage_category: Option<TriageCategory>,
    pub state: PatientState,
    pub location: String,
    pub destination: Option<String>,
    pub active_transport: Option<MissionId>,
    pub timeline: Vec<TimelineEntry>,
    pub treatments_received: Vec<TreatmentRecord>,
    pub diagnoses: Vec<DiagnosisRecord>,
}

impl Patient {
    pub fn severity_band(&self) -> SeverityBand {
        SeverityBand::from_ordinal(self.severity)
    }

    /// Subtract and clamp to [0,100]; never below 0.
    pub fn apply_health_delta(&mut self, delta: f64) {
        self.current_health = (self.current_health + delta).clamp(0.0, 100.0);
    }

    pub fn record(&mut self, at: SimInstant, kind: EventKind, location: &str, details: serde_json::Value) {
        self.timeline.push(TimelineEntry {
            at,
            kind,
            location: location.to_string(),
            details,
        });
    }

    pub fn is_dead(&self) -> bool {
        self.current_health <= 0.0
    }
}
