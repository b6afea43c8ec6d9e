//! Worker pool: `pool_size` background loops, each pulling the
//! highest-priority pending job and running it to completion.
//!
//! Grounded on `src/core/job_worker.py`'s `JobWorkerPool`/`JobWorker`: a
//! fixed-size pool of workers that each poll the repository for pending
//! jobs, sort by `(priority, created_at)`, and claim the winner before
//! handing it to `worker::execute_job`.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::governor::ResourceGovernor;
use crate::model::{Job, JobStatus};
use crate::repository::JobRepository;
use crate::worker;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const RESOURCE_WAIT: Duration = Duration::from_secs(5);

/// Highest priority first, oldest submission first among ties
/// (`job_worker.py::_get_next_job`'s `sort(key=(priority, created_at))`).
fn select_next_job(jobs: &[Job]) -> Option<&Job> {
    jobs.iter().filter(|j| j.status == JobStatus::Pending).min_by_key(|j| (Reverse(j.config.priority), j.created_at))
}

pub struct JobWorkerPool {
    repo: Arc<dyn JobRepository>,
    governor: Arc<ResourceGovernor>,
    pool_size: usize,
    running: Arc<AtomicBool>,
}

impl JobWorkerPool {
    pub fn new(repo: Arc<dyn JobRepository>, governor: Arc<ResourceGovernor>, pool_size: usize) -> Self {
        Self { repo, governor, pool_size: pool_size.max(1), running: Arc::new(AtomicBool::new(false)) }
    }

    /// Spawns `pool_size` detached loops and returns immediately. Each loop
    /// waits for a free governor slot, picks the best pending job, claims
    /// it, and runs it; claim failure (another worker won the race) just
    /// restarts the loop rather than erroring.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        for worker_index in 0..self.pool_size {
            let repo = self.repo.clone();
            let governor = self.governor.clone();
            let running = self.running.clone();
            tokio::spawn(async move { Self::run_worker(worker_index, repo, governor, running).await });
        }
    }

    async fn run_worker(worker_index: usize, repo: Arc<dyn JobRepository>, governor: Arc<ResourceGovernor>, running: Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            if !governor.wait_for_resources(RESOURCE_WAIT).await {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            let jobs = match repo.list().await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(worker = worker_index, error = %e, "failed to list jobs");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };
            let Some(next_id) = select_next_job(&jobs).map(|j| j.id) else {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            };

            match repo.try_claim(&next_id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(worker = worker_index, job_id = %next_id, error = %e, "failed to claim job");
                    continue;
                }
            }

            if let Err(e) = worker::execute_job(next_id, repo.clone(), governor.clone()).await {
                warn!(worker = worker_index, job_id = %next_id, error = %e, "job execution returned an error");
            }
        }
    }

    /// Signals all loops to exit after their current job, if any. Does not
    /// wait for them to drain.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobConfig, JobPriority};
    use crate::repository::InMemoryJobRepository;

    fn config(priority: JobPriority) -> JobConfig {
        JobConfig {
            configuration_id: None,
            configuration: None,
            total_patients: Some(5),
            output_formats: vec![],
            use_compression: false,
            use_encryption: false,
            encryption_password: None,
            priority,
        }
    }

    #[test]
    fn selects_highest_priority_job_first() {
        let low = Job::new(config(JobPriority::Low));
        let high = Job::new(config(JobPriority::High));
        let jobs = vec![low, high.clone()];
        let selected = select_next_job(&jobs).unwrap();
        assert_eq!(selected.id, high.id);
    }

    #[test]
    fn ties_break_by_submission_order() {
        let mut first = Job::new(config(JobPriority::Normal));
        let mut second = Job::new(config(JobPriority::Normal));
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        first.created_at -= chrono::Duration::seconds(1);
        let jobs = vec![second.clone(), first.clone()];
        let selected = select_next_job(&jobs).unwrap();
        assert_eq!(selected.id, first.id);
    }

    #[test]
    fn ignores_non_pending_jobs() {
        let mut running = Job::new(config(JobPriority::High));
        running.mark_running();
        let pending = Job::new(config(JobPriority::Low));
        let jobs = vec![running, pending.clone()];
        let selected = select_next_job(&jobs).unwrap();
        assert_eq!(selected.id, pending.id);
    }

    #[tokio::test]
    async fn pool_runs_a_submitted_job_to_completion() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let governor = Arc::new(ResourceGovernor::new(crate::governor::GovernorConfig::default()));
        let job = Job::new(config(JobPriority::Normal));
        let id = job.id;
        repo.create(job).await.unwrap();

        let pool = JobWorkerPool::new(repo.clone(), governor, 1);
        pool.start();

        let mut finished = None;
        for _ in 0..50 {
            let job = repo.get(&id).await.unwrap();
            if job.status.is_terminal() {
                finished = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        pool.stop();

        let finished = finished.expect("job did not finish within the test's poll budget");
        assert_eq!(finished.status, JobStatus::Completed);
    }
}
