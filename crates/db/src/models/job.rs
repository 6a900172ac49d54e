//! Row model for the `jobs` table.

use sqlx::FromRow;
use swarm_core::job::{Job, JobStatus};
use swarm_core::types::{JobId, Timestamp};

use crate::store::StoreError;

/// A row from the `jobs` table.
///
/// `status` is stored as text; conversion into [`Job`] validates it.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub task: String,
    pub status: String,
    pub result: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|_| StoreError::CorruptRow {
                id: row.id,
                reason: format!("unknown status '{}'", row.status),
            })?;

        Ok(Job {
            id: row.id,
            task: row.task,
            status,
            result: row.result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
