//! Handlers for job submission and status hydration.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use swarm_core::error::CoreError;
use swarm_core::job::JobStatus;
use swarm_core::messages::{JobQueuedEvent, JOB_QUEUE_TOPIC};
use swarm_core::types::JobId;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /job.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "task must not be empty"))]
    pub task: String,
    #[validate(length(min = 1, message = "swarm_id must not be empty"))]
    pub swarm_id: String,
}

/// Response for POST /job.
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub status: JobStatus,
    pub job_id: JobId,
}

/// Response for GET /job/{id}.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/job
///
/// Persists a queued job, then hands it to the bus in the background. The
/// response does not wait for the publish.
pub async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.map_err(|_| missing_fields())?;
    input.validate().map_err(|e| {
        tracing::debug!(error = %e, "Rejected job submission");
        missing_fields()
    })?;

    let job = state.store.create_job(&input.task).await?;

    let event = JobQueuedEvent {
        job_id: job.id,
        task: job.task.clone(),
        swarm_id: input.swarm_id,
    };
    match serde_json::to_vec(&event) {
        Ok(payload) => {
            state.publisher.publish(JOB_QUEUE_TOPIC, payload);
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Failed to encode queued job event");
        }
    }

    tracing::info!(job_id = %job.id, "Job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            status: job.status,
            job_id: job.id,
        }),
    ))
}

fn missing_fields() -> AppError {
    AppError::BadRequest("task and swarm_id are required".into())
}

/// GET /api/v1/job/{id}
///
/// Current persisted state of a job, for observers hydrating after connect.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobStatusResponse>> {
    let id: JobId = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid job id '{id}'")))?;

    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "job", id })?;

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        status: job.status,
        data: job.result,
    }))
}
