//! Job domain model
//!
//! Grounded on the original `src/domain/models/job.py`: a `Job` owns a
//! configuration snapshot, a status, a 0-100 progress counter, and an
//! optional `JobProgressDetails` breakdown by phase. `cancelled` is carried
//! forward per spec.md's `Job` status set (the original only has
//! pending/queued/running/completed/failed).

use chrono::{DateTime, Utc};
use medsim_common::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    Xml,
    Fhir,
}

/// Snapshot of the generation parameters a job was submitted with. Owned by
/// the job, not mutated once the job starts (spec.md 3, `Job` data model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub configuration_id: Option<String>,
    pub configuration: Option<serde_json::Value>,
    pub total_patients: Option<u32>,
    pub output_formats: Vec<OutputFormat>,
    pub use_compression: bool,
    pub use_encryption: bool,
    pub encryption_password: Option<String>,
    pub priority: JobPriority,
}

/// Per-phase progress breakdown (spec.md 4.14's "phase, phase progress,
/// totals"), carried from the original's `JobProgressDetails`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressDetails {
    pub current_phase: String,
    pub phase_description: String,
    pub phase_progress: u8,
    pub total_patients: Option<u32>,
    pub processed_patients: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub config: JobConfig,
    pub progress: u8,
    pub progress_details: Option<JobProgressDetails>,
    pub error: Option<String>,
    pub result_manifest: Vec<String>,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            config,
            progress: 0,
            progress_details: None,
            error: None,
            result_manifest: Vec::new(),
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
    }

    pub fn mark_completed(&mut self, result_manifest: Vec<String>) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.result_manifest = result_manifest;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.error = Some("cancelled".to_string());
        self.completed_at = Some(Utc::now());
    }

    pub fn update_progress(&mut self, progress: u8, details: JobProgressDetails) {
        self.progress = progress.min(100);
        self.progress_details = Some(details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JobConfig {
        JobConfig {
            configuration_id: None,
            configuration: None,
            total_patients: Some(500),
            output_formats: vec![OutputFormat::Json],
            use_compression: false,
            use_encryption: false,
            encryption_password: None,
            priority: JobPriority::Normal,
        }
    }

    #[test]
    fn new_job_starts_pending_with_zero_progress() {
        let job = Job::new(config());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn mark_completed_sets_terminal_state_and_full_progress() {
        let mut job = Job::new(config());
        job.mark_running();
        job.mark_completed(vec!["out.json".to_string()]);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn mark_cancelled_records_cancellation_reason() {
        let mut job = Job::new(config());
        job.mark_cancelled();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.error.as_deref(), Some("cancelled"));
    }
}
