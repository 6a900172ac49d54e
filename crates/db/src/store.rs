//! The store seam used by the relay worker and the HTTP shell.

use async_trait::async_trait;
use swarm_core::job::{Job, JobStatus};
use swarm_core::types::JobId;

use crate::repositories::JobRepo;
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} has a corrupt row: {reason}")]
    CorruptRow { id: JobId, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable job storage. Implementations must be safe for concurrent callers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a queued job with an empty result.
    async fn create_job(&self, task: &str) -> Result<Job, StoreError>;

    /// Fetch a job; `Ok(None)` when it does not exist.
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Set status and result of an existing job, keyed by `id`.
    ///
    /// Applying the same `(status, result)` twice leaves the job in the
    /// same state as applying it once. Fails with [`StoreError::NotFound`]
    /// when no job has that id.
    async fn upsert_job_status(
        &self,
        id: JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Postgres-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, task: &str) -> Result<Job, StoreError> {
        JobRepo::create(&self.pool, task).await?.try_into()
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_by_id(&self.pool, id)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn upsert_job_status(
        &self,
        id: JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        match JobRepo::update_status(&self.pool, id, status, result).await? {
            0 => Err(StoreError::NotFound(id)),
            _ => Ok(()),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
