mod common;

use chrono::{Months, NaiveDate, NaiveDateTime, TimeDelta};
use common::test_config;
use postdesk::batch::JobStatus;
use postdesk::build_scheduler;
use postdesk::db::{Database, UserRole};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 10)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

async fn deleted_user_with_post(db: &Database, email: &str, deleted_at: NaiveDateTime) -> i64 {
    let id = db
        .users()
        .create(email, "hash", "Someone", UserRole::User)
        .await
        .unwrap();
    db.posts()
        .create(id, "title", "", "content")
        .await
        .unwrap()
        .unwrap();
    db.refresh_tokens()
        .upsert(id, "jti", "token", deleted_at, deleted_at + TimeDelta::days(14))
        .await
        .unwrap();
    assert!(db.users().soft_delete(id, deleted_at).await.unwrap());
    id
}

async fn row_count(db: &Database, sql: &'static str, id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as(sql)
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn test_purge_after_retention_then_idempotent() {
    let db = Database::open(":memory:").await.unwrap();
    let scheduler = build_scheduler(&test_config(db.clone()));

    let old = deleted_user_with_post(&db, "old@example.com", t0()).await;
    let recent =
        deleted_user_with_post(&db, "recent@example.com", t0() + TimeDelta::days(40)).await;
    let live = db
        .users()
        .create("live@example.com", "hash", "Live", UserRole::User)
        .await
        .unwrap();

    let run_at = t0().checked_add_months(Months::new(12)).unwrap();
    let execution = scheduler.run(run_at).await.unwrap();
    assert_eq!(execution.status, JobStatus::Completed);
    assert_eq!(execution.processed, 1);

    assert_eq!(row_count(&db, "SELECT COUNT(*) FROM users WHERE id = ?", old).await, 0);
    assert_eq!(row_count(&db, "SELECT COUNT(*) FROM posts WHERE user_id = ?", old).await, 0);
    assert_eq!(
        row_count(&db, "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?", old).await,
        0
    );

    // Not yet past retention, and never deleted
    assert_eq!(row_count(&db, "SELECT COUNT(*) FROM users WHERE id = ?", recent).await, 1);
    assert!(db.users().get_by_id(live).await.unwrap().is_some());

    // A day later there is nothing left to do
    let execution = scheduler.run(run_at + TimeDelta::days(1)).await.unwrap();
    assert_eq!(execution.status, JobStatus::Completed);
    assert_eq!(execution.processed, 0);
}

#[tokio::test]
async fn test_purge_before_retention_keeps_user() {
    let db = Database::open(":memory:").await.unwrap();
    let scheduler = build_scheduler(&test_config(db.clone()));

    let id = deleted_user_with_post(&db, "old@example.com", t0()).await;

    let almost = t0().checked_add_months(Months::new(12)).unwrap() - TimeDelta::seconds(1);
    let execution = scheduler.run(almost).await.unwrap();
    assert_eq!(execution.processed, 0);
    assert_eq!(row_count(&db, "SELECT COUNT(*) FROM users WHERE id = ?", id).await, 1);
}

#[tokio::test]
async fn test_every_run_is_recorded() {
    let db = Database::open(":memory:").await.unwrap();
    let scheduler = build_scheduler(&test_config(db.clone()));

    let first = scheduler.run(t0()).await.unwrap();
    let second = scheduler.run(t0() + TimeDelta::days(1)).await.unwrap();
    assert_ne!(first.id, second.id);

    let record = db.job_executions().get(second.id).await.unwrap().unwrap();
    assert_eq!(record.job_name, "deleteUserJob");
    assert_eq!(record.status, "COMPLETED");
    assert_eq!(record.processed, 0);
}
