//! Tests for `AppError` to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use swarm_api::error::AppError;
use swarm_core::error::CoreError;
use swarm_db::StoreError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn core_not_found_maps_to_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "job",
        id: uuid::Uuid::nil(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "job not found");
}

#[tokio::test]
async fn store_not_found_maps_to_404() {
    let (status, json) =
        error_to_response(AppError::Store(StoreError::NotFound(uuid::Uuid::nil()))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "job not found");
}

#[tokio::test]
async fn validation_maps_to_400() {
    let err = AppError::Core(CoreError::Validation("unknown job status 'x'".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "unknown job status 'x'");
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let err = AppError::Store(StoreError::CorruptRow {
        id: uuid::Uuid::nil(),
        reason: "unknown status 'exploded'".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
