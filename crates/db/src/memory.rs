//! In-process [`JobStore`] for tests and `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use swarm_core::job::{empty_result, Job, JobStatus};
use swarm_core::types::JobId;
use tokio::sync::RwLock;

use crate::store::{JobStore, StoreError};

/// Jobs held in a map behind an async `RwLock`. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job as-is, replacing any job with the same id.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, task: &str) -> Result<Job, StoreError> {
        let now = Utc::now();
        let job = Job {
            id: uuid::Uuid::new_v4(),
            task: task.to_string(),
            status: JobStatus::Queued,
            result: empty_result(),
            created_at: now,
            updated_at: now,
        };
        self.insert(job.clone()).await;
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn upsert_job_status(
        &self,
        id: JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.status = status;
        job.result = result.clone();
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn create_starts_queued_with_empty_result() {
        let store = MemoryJobStore::new();
        let job = store.create_job("echo").await.unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.result, json!({}));
        assert_eq!(store.get_job(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn upsert_twice_equals_upsert_once() {
        let store = MemoryJobStore::new();
        let job = store.create_job("echo").await.unwrap();
        let result = json!({"output": "hi"});

        store
            .upsert_job_status(job.id, JobStatus::Completed, &result)
            .await
            .unwrap();
        let once = store.get_job(job.id).await.unwrap().unwrap();

        store
            .upsert_job_status(job.id, JobStatus::Completed, &result)
            .await
            .unwrap();
        let twice = store.get_job(job.id).await.unwrap().unwrap();

        assert_eq!(once.id, twice.id);
        assert_eq!(once.task, twice.task);
        assert_eq!(once.status, twice.status);
        assert_eq!(once.result, twice.result);
        assert_eq!(once.created_at, twice.created_at);
    }

    #[tokio::test]
    async fn upsert_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let id = uuid::Uuid::new_v4();

        let err = store
            .upsert_job_status(id, JobStatus::Processing, &json!({}))
            .await
            .unwrap_err();

        assert_matches!(err, StoreError::NotFound(missing) if missing == id);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn get_unknown_job_is_none() {
        let store = MemoryJobStore::new();
        assert!(store.get_job(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }
}
