//! Batch job execution history.

use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePool;

use super::to_db_timestamp;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobExecutionRecord {
    pub id: i64,
    pub job_name: String,
    pub parameters: String,
    pub status: String,
    pub processed: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub error: Option<String>,
}

pub struct JobExecutionStore {
    pool: SqlitePool,
}

impl JobExecutionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the start of a run. Returns the execution ID.
    pub async fn start(
        &self,
        job_name: &str,
        parameters: &str,
        started_at: NaiveDateTime,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO job_executions (job_name, parameters, status, started_at) VALUES (?, ?, 'STARTED', ?)",
        )
        .bind(job_name)
        .bind(parameters)
        .bind(to_db_timestamp(started_at))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record the outcome of a run.
    pub async fn finish(
        &self,
        id: i64,
        status: &str,
        processed: u64,
        ended_at: NaiveDateTime,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE job_executions SET status = ?, processed = ?, ended_at = ?, error = ? WHERE id = ?",
        )
        .bind(status)
        .bind(processed as i64)
        .bind(to_db_timestamp(ended_at))
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<JobExecutionRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, job_name, parameters, status, processed, started_at, ended_at, error
             FROM job_executions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
