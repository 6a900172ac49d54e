//! Route definitions for job submission and lookup.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// POST /job       -> create_job
/// GET  /job/{id}  -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/job", post(jobs::create_job))
        .route("/job/{id}", get(jobs::get_job))
}
