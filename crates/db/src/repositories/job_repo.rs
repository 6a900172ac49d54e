//! Repository for the `jobs` table.
//!
//! Soft-deleted rows (`deleted_at IS NOT NULL`) are invisible to every
//! query here.

use sqlx::PgPool;
use swarm_core::job::JobStatus;
use swarm_core::types::JobId;

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "id, task, status, result, created_at, updated_at";

/// Provides CRUD operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new queued job with an empty result.
    pub async fn create(pool: &PgPool, task: &str) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (task, status, result) \
             VALUES ($1, $2, '{{}}'::jsonb) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(task)
            .bind(JobStatus::Queued.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a live job by id.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite status and result of a live job.
    ///
    /// Returns the number of rows touched (0 when the job does not exist).
    /// Re-applying the same values leaves the row unchanged apart from
    /// `updated_at`.
    pub async fn update_status(
        pool: &PgPool,
        id: JobId,
        status: JobStatus,
        result: &serde_json::Value,
    ) -> Result<u64, sqlx::Error> {
        let done = sqlx::query(
            "UPDATE jobs SET status = $2, result = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(result)
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    }
}
