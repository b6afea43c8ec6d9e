//! Job repository — persistence abstraction for the job store
//!
//! The core exposes only async `create/get/update/list/delete` against this
//! trait (spec.md 6, "Persisted state"); the database-backed implementation
//! is an external collaborator out of scope here. `InMemoryJobRepository`
//! is the implementation this crate ships: a `dashmap` keyed by id, safe
//! for concurrent readers and writers (spec.md 5, "job store... process-
//! wide... safe for concurrent readers and writers").

use crate::model::{Job, JobStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use medsim_common::JobId;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("job not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: Job) -> RepoResult<()>;
    async fn get(&self, id: &JobId) -> RepoResult<Job>;
    async fn update(&self, job: Job) -> RepoResult<()>;
    async fn list(&self) -> RepoResult<Vec<Job>>;
    async fn delete(&self, id: &JobId) -> RepoResult<()>;

    /// Atomically transitions a `Pending` job to `Queued`, the claim a
    /// worker pool uses so two workers never pick up the same pending job
    /// (`pool::select_next_job` finds a candidate, then claims it here).
    /// Returns `false` if the job was already claimed or is past `Pending`.
    async fn try_claim(&self, id: &JobId) -> RepoResult<bool>;
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self { jobs: DashMap::new() }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: Job) -> RepoResult<()> {
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> RepoResult<Job> {
        self.jobs.get(id).map(|r| r.value().clone()).ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, job: Job) -> RepoResult<()> {
        if !self.jobs.contains_key(&job.id) {
            return Err(RepositoryError::NotFound(job.id.to_string()));
        }
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn list(&self) -> RepoResult<Vec<Job>> {
        Ok(self.jobs.iter().map(|r| r.value().clone()).collect())
    }

    async fn delete(&self, id: &JobId) -> RepoResult<()> {
        self.jobs.remove(id).map(|_| ()).ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn try_claim(&self, id: &JobId) -> RepoResult<bool> {
        let mut entry = self.jobs.get_mut(id).ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if entry.status != JobStatus::Pending {
            return Ok(false);
        }
        entry.status = JobStatus::Queued;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobConfig, JobPriority};

    fn config() -> JobConfig {
        JobConfig {
            configuration_id: None,
            configuration: None,
            total_patients: Some(10),
            output_formats: vec![],
            use_compression: false,
            use_encryption: false,
            encryption_password: None,
            priority: JobPriority::Normal,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryJobRepository::new();
        let job = Job::new(config());
        let id = job.id;
        repo.create(job).await.unwrap();

        let fetched = repo.get(&id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn get_unknown_job_is_not_found() {
        let repo = InMemoryJobRepository::new();
        let result = repo.get(&JobId::new()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_from_list() {
        let repo = InMemoryJobRepository::new();
        let job = Job::new(config());
        let id = job.id;
        repo.create(job).await.unwrap();
        repo.delete(&id).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_unknown_job_is_not_found() {
        let repo = InMemoryJobRepository::new();
        let job = Job::new(config());
        assert!(matches!(repo.update(job).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn try_claim_succeeds_once_then_refuses() {
        let repo = InMemoryJobRepository::new();
        let job = Job::new(config());
        let id = job.id;
        repo.create(job).await.unwrap();

        assert!(repo.try_claim(&id).await.unwrap());
        assert!(!repo.try_claim(&id).await.unwrap());
        assert_eq!(repo.get(&id).await.unwrap().status, crate::model::JobStatus::Queued);
    }
}
