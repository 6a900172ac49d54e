//! Job entity and its status lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Lifecycle status of a job.
///
/// Serialized in lowercase (`"queued"`, `"processing"`, ...). The
/// capitalised spellings are accepted on input so agents that emit
/// `"Processing"` are not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "Queued")]
    Queued,
    #[serde(alias = "Processing")]
    Processing,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Failed")]
    Failed,
}

impl JobStatus {
    /// The canonical string stored in the database and sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// A job as held by the store.
///
/// `id` and `task` never change after creation. `status` and `result` are
/// only ever mutated by the relay worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub task: String,
    pub status: JobStatus,
    pub result: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The empty JSON object used as the default `result`.
pub fn empty_result() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
