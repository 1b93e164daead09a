//! Named batch jobs and their launcher.
//!
//! A job is looked up by name in a [`JobRegistry`] and run through a
//! [`JobLauncher`], which records every run in `job_executions` and refuses
//! to start a job that is already running.

mod delete_users;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{error, info};

use crate::db::Database;

pub use delete_users::{DELETE_USER_JOB, DeleteUserJob};

/// Parameters passed to every job run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobParameters {
    /// The instant the run treats as "now" (UTC)
    pub now: NaiveDateTime,
}

/// A unit of batch work.
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run once. Returns the number of rows processed.
    fn execute<'a>(&'a self, params: &'a JobParameters) -> BoxFuture<'a, Result<u64, BatchError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// Outcome of one launched run.
#[derive(Debug, Clone)]
pub struct JobExecution {
    pub id: i64,
    pub job_name: &'static str,
    pub status: JobStatus,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub processed: u64,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("No job registered as {0}")]
    UnknownJob(String),
    #[error("Job {0} is already running")]
    AlreadyRunning(&'static str),
    #[error("Invalid job parameters: {0}")]
    InvalidParameters(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Jobs resolvable by name.
#[derive(Default, Clone)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn Job>) {
        self.jobs.insert(job.name(), job);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Job>, BatchError> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| BatchError::UnknownJob(name.to_string()))
    }
}

/// Runs jobs and records their executions.
#[derive(Clone)]
pub struct JobLauncher {
    db: Database,
    running: Arc<Mutex<HashSet<&'static str>>>,
}

/// Releases a job's in-flight slot when dropped.
struct RunningGuard {
    running: Arc<Mutex<HashSet<&'static str>>>,
    name: &'static str,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(self.name);
    }
}

impl JobLauncher {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, name: &'static str) -> Result<RunningGuard, BatchError> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(name) {
            return Err(BatchError::AlreadyRunning(name));
        }
        Ok(RunningGuard {
            running: self.running.clone(),
            name,
        })
    }

    /// Run `job` to completion.
    ///
    /// A job that fails still yields an execution with `JobStatus::Failed`.
    /// `Err` means the run could not be started or recorded.
    pub async fn run(
        &self,
        job: &dyn Job,
        params: JobParameters,
    ) -> Result<JobExecution, BatchError> {
        let name = job.name();
        let _guard = self.claim(name)?;

        let parameters = serde_json::to_string(&params)
            .map_err(|e| BatchError::InvalidParameters(e.to_string()))?;
        let start = Utc::now().naive_utc();
        let store = self.db.job_executions();
        let id = store.start(name, &parameters, start).await?;

        info!(job = name, execution_id = id, now = %params.now, "Job started");

        let (status, processed, error) = match job.execute(&params).await {
            Ok(processed) => (JobStatus::Completed, processed, None),
            Err(e) => {
                error!(job = name, execution_id = id, error = %e, "Job failed");
                (JobStatus::Failed, 0, Some(e.to_string()))
            }
        };

        let end = Utc::now().naive_utc();
        store
            .finish(id, status.as_str(), processed, end, error.as_deref())
            .await?;

        Ok(JobExecution {
            id,
            job_name: name,
            status,
            start,
            end,
            processed,
            error,
        })
    }
}
