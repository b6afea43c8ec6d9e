//! Resource governor (C14) — memory/CPU/runtime caps and admission control
//!
//! Grounded on `src/core/job_resource_manager.py`'s `JobResourceManager`:
//! a per-job tracking context that samples the current process's memory and
//! CPU usage on an interval and raises when a cap is breached, plus
//! `can_start_new_job`/`wait_for_resources` backpressure gates keyed off
//! system-wide memory/CPU percent. `psutil` becomes `sysinfo`, matching how
//! `sx9-cdn-isolated-monitoring::resource_monitor` samples
//! `System::new_all()` / `refresh_all()` / `global_cpu_info().cpu_usage()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::sync::Mutex;
use tokio::time::sleep;

use medsim_common::{SimError, SimResult};

#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    pub max_memory_mb: u64,
    pub max_cpu_seconds: u64,
    pub max_runtime_seconds: u64,
    pub check_interval_seconds: u64,
    pub batch_size: u32,
    pub batch_delay_ms: u64,
    pub max_concurrent_jobs: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            max_cpu_seconds: 300,
            max_runtime_seconds: 600,
            check_interval_seconds: 5,
            batch_size: 1000,
            batch_delay_ms: 100,
            max_concurrent_jobs: 2,
        }
    }
}

impl GovernorConfig {
    /// Reads the env vars spec.md section 6 names, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_memory_mb: env_u64("JOB_MAX_MEMORY_MB", default.max_memory_mb),
            max_cpu_seconds: env_u64("JOB_MAX_CPU_SECONDS", default.max_cpu_seconds),
            max_runtime_seconds: env_u64("JOB_MAX_RUNTIME_SECONDS", default.max_runtime_seconds),
            check_interval_seconds: default.check_interval_seconds,
            batch_size: env_u64("JOB_BATCH_SIZE", default.batch_size as u64) as u32,
            batch_delay_ms: default.batch_delay_ms,
            max_concurrent_jobs: env_u64("MAX_CONCURRENT_JOBS", default.max_concurrent_jobs as u64) as usize,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

struct ActiveJob {
    start: Instant,
    cpu_seconds_accumulated: f64,
    last_sample: Instant,
    cancelled: Arc<AtomicBool>,
}

/// Tracks active jobs and samples this process's own memory/CPU; `system`
/// is refreshed lazily under a mutex since `sysinfo::System` is `!Sync`.
pub struct ResourceGovernor {
    config: GovernorConfig,
    active: Mutex<std::collections::HashMap<String, ActiveJob>>,
    system: Mutex<System>,
    pid: Pid,
}

/// Handle returned by [`ResourceGovernor::track`]; callers poll
/// [`Self::check`] at chunk boundaries and must call [`Self::finish`] (or
/// drop it, which leaves the job registered as a leak the next
/// `can_start_new_job` call would undercount — callers are expected to
/// always call `finish`).
pub struct JobGuard<'a> {
    governor: &'a ResourceGovernor,
    job_id: String,
    cancel_flag: Arc<AtomicBool>,
}

impl ResourceGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            config,
            active: Mutex::new(std::collections::HashMap::new()),
            system: Mutex::new(system),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Begins tracking `job_id`; returns the cancellation flag so the
    /// caller can surface a cancel request and a guard used to poll caps.
    pub async fn track(&self, job_id: impl Into<String>) -> JobGuard<'_> {
        let job_id = job_id.into();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let now = Instant::now();
        self.active.lock().await.insert(
            job_id.clone(),
            ActiveJob { start: now, cpu_seconds_accumulated: 0.0, last_sample: now, cancelled: cancel_flag.clone() },
        );
        JobGuard { governor: self, job_id, cancel_flag }
    }

    /// `sysinfo` reports instantaneous CPU load as a percentage rather than
    /// accumulated seconds (unlike `psutil.cpu_times()` in the original);
    /// this approximates accumulated CPU-seconds as
    /// `percent/100 * wall_seconds_since_last_sample`, integrated on every
    /// `check()` call.
    async fn sample_cpu_percent(&self) -> f32 {
        let mut system = self.system.lock().await;
        system.refresh_process(self.pid);
        system.process(self.pid).map(|p| p.cpu_usage()).unwrap_or(0.0)
    }

    async fn process_memory_mb(&self) -> f64 {
        let mut system = self.system.lock().await;
        system.refresh_process(self.pid);
        system.process(self.pid).map(|p| p.memory() as f64 / 1024.0 / 1024.0).unwrap_or(0.0)
    }

    /// Raises [`SimError::ResourceLimitExceeded`] the moment any of the
    /// three caps is breached; callers invoke this at chunk boundaries
    /// rather than on a background timer, since the engine itself is
    /// logically single-threaded and has no wall-clock ticker of its own.
    async fn check(&self, job_id: &str) -> SimResult<()> {
        let runtime = {
            let active = self.active.lock().await;
            let Some(job) = active.get(job_id) else { return Ok(()) };
            if job.cancelled.load(Ordering::SeqCst) {
                return Err(SimError::InvalidOperation("cancelled".to_string()));
            }
            job.start.elapsed()
        };
        if runtime > Duration::from_secs(self.config.max_runtime_seconds) {
            return Err(SimError::ResourceLimitExceeded(format!(
                "job {job_id} exceeded maximum runtime of {}s",
                self.config.max_runtime_seconds
            )));
        }

        let memory_mb = self.process_memory_mb().await;
        if memory_mb > self.config.max_memory_mb as f64 {
            return Err(SimError::ResourceLimitExceeded(format!(
                "job {job_id} exceeded memory limit: {memory_mb:.1}MB > {}MB",
                self.config.max_memory_mb
            )));
        }

        let percent = self.sample_cpu_percent().await;
        let cpu_seconds = {
            let mut active = self.active.lock().await;
            let Some(job) = active.get_mut(job_id) else { return Ok(()) };
            let elapsed = job.last_sample.elapsed().as_secs_f64();
            job.cpu_seconds_accumulated += percent as f64 / 100.0 * elapsed;
            job.last_sample = Instant::now();
            job.cpu_seconds_accumulated
        };
        if cpu_seconds > self.config.max_cpu_seconds as f64 {
            return Err(SimError::ResourceLimitExceeded(format!(
                "job {job_id} exceeded CPU time limit: {cpu_seconds:.1}s > {}s",
                self.config.max_cpu_seconds
            )));
        }

        Ok(())
    }

    async fn finish(&self, job_id: &str) {
        self.active.lock().await.remove(job_id);
    }

    /// Sets the cancellation flag for an actively-tracked job; the running
    /// cohort observes it at its next `JobGuard::check()` call (a chunk
    /// boundary, per spec.md 5's "cancellation... observed... at chunk
    /// boundaries"). Returns `false` if the job isn't currently tracked
    /// (not yet started, or already finished) so the caller can fall back
    /// to cancelling it directly in the job store.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.active.lock().await.get(job_id) {
            Some(job) => {
                job.cancelled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// `can_start_new_job`: refuses when concurrent jobs >= the configured
    /// max, or when system memory or CPU utilization exceeds 90%.
    pub async fn can_start_new_job(&self) -> bool {
        if self.active.lock().await.len() >= self.config.max_concurrent_jobs {
            return false;
        }
        let mut system = self.system.lock().await;
        system.refresh_memory();
        system.refresh_cpu();
        let memory_percent = if system.total_memory() > 0 {
            system.used_memory() as f64 / system.total_memory() as f64 * 100.0
        } else {
            0.0
        };
        if memory_percent > 90.0 {
            return false;
        }
        system.global_cpu_info().cpu_usage() as f64 <= 90.0
    }

    /// Cooperative backpressure: polls `can_start_new_job` until it returns
    /// true or `timeout` elapses.
    pub async fn wait_for_resources(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.can_start_new_job().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    pub async fn active_job_count(&self) -> usize {
        self.active.lock().await.len()
    }
}

impl JobGuard<'_> {
    pub async fn check(&self) -> SimResult<()> {
        self.governor.check(&self.job_id).await
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub async fn finish(self) {
        self.governor.finish(&self.job_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_job_passes_checks_under_default_caps() {
        let governor = ResourceGovernor::new(GovernorConfig::default());
        let guard = governor.track("job-1").await;
        assert!(guard.check().await.is_ok());
        guard.finish().await;
        assert_eq!(governor.active_job_count().await, 0);
    }

    #[tokio::test]
    async fn zero_runtime_cap_trips_immediately() {
        let mut config = GovernorConfig::default();
        config.max_runtime_seconds = 0;
        let governor = ResourceGovernor::new(config);
        let guard = governor.track("job-2").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(guard.check().await, Err(SimError::ResourceLimitExceeded(_))));
    }

    #[tokio::test]
    async fn cancellation_flag_surfaces_as_invalid_operation() {
        let governor = ResourceGovernor::new(GovernorConfig::default());
        let guard = governor.track("job-3").await;
        guard.cancel_flag().store(true, Ordering::SeqCst);
        assert!(matches!(guard.check().await, Err(SimError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn cancel_sets_flag_observed_by_next_check() {
        let governor = ResourceGovernor::new(GovernorConfig::default());
        let guard = governor.track("job-5").await;
        assert!(governor.cancel("job-5").await);
        assert!(matches!(guard.check().await, Err(SimError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn cancel_of_untracked_job_returns_false() {
        let governor = ResourceGovernor::new(GovernorConfig::default());
        assert!(!governor.cancel("no-such-job").await);
    }

    #[tokio::test]
    async fn concurrent_job_cap_blocks_new_starts() {
        let mut config = GovernorConfig::default();
        config.max_concurrent_jobs = 1;
        let governor = ResourceGovernor::new(config);
        let _guard = governor.track("job-4").await;
        assert!(!governor.can_start_new_job().await);
    }
}
