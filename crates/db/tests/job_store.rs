//! Postgres-backed store tests.
//!
//! These need a live database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p swarm-db -- --ignored`.

use serde_json::json;
use sqlx::PgPool;
use swarm_core::job::JobStatus;
use swarm_db::{JobStore, PgJobStore, StoreError};

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn create_then_get_round_trip(pool: PgPool) {
    let store = PgJobStore::new(pool);

    let created = store.create_job("echo").await.unwrap();
    assert_eq!(created.status, JobStatus::Queued);
    assert_eq!(created.result, json!({}));

    let fetched = store.get_job(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.task, "echo");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn repeated_update_is_idempotent(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let job = store.create_job("echo").await.unwrap();
    let result = json!({"output": "hi"});

    for _ in 0..2 {
        store
            .upsert_job_status(job.id, JobStatus::Completed, &result)
            .await
            .unwrap();
    }

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result, result);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn update_of_missing_job_is_not_found(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let err = store
        .upsert_job_status(uuid::Uuid::new_v4(), JobStatus::Failed, &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn soft_deleted_job_is_invisible(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    let job = store.create_job("echo").await.unwrap();

    sqlx::query("UPDATE jobs SET deleted_at = NOW() WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(store.get_job(job.id).await.unwrap().is_none());
    assert!(matches!(
        store
            .upsert_job_status(job.id, JobStatus::Processing, &json!({}))
            .await,
        Err(StoreError::NotFound(_))
    ));
}
