//! Nightly purge of soft-deleted users.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use tracing::{error, info};

use crate::batch::{
    DELETE_USER_JOB, JobExecution, JobLauncher, JobParameters, JobRegistry, JobStatus,
};

/// Launches `deleteUserJob` once a day at a fixed local time.
#[derive(Clone)]
pub struct UserScheduler {
    registry: Arc<JobRegistry>,
    launcher: JobLauncher,
    at: NaiveTime,
}

impl UserScheduler {
    pub fn new(registry: Arc<JobRegistry>, launcher: JobLauncher, at: NaiveTime) -> Self {
        Self {
            registry,
            launcher,
            at,
        }
    }

    /// Launch the purge for `now` (UTC). Errors are logged, never returned.
    pub async fn run(&self, now: NaiveDateTime) -> Option<JobExecution> {
        let result = match self.registry.get(DELETE_USER_JOB) {
            Ok(job) => {
                self.launcher
                    .run(job.as_ref(), JobParameters { now })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(execution) if execution.status == JobStatus::Completed => {
                info!(
                    job_id = execution.id,
                    start = %execution.start,
                    end = %execution.end,
                    processed = execution.processed,
                    "User scheduler job succeeded"
                );
                Some(execution)
            }
            Ok(execution) => {
                error!(
                    job_id = execution.id,
                    start = %execution.start,
                    end = %execution.end,
                    error = execution.error.as_deref().unwrap_or("unknown"),
                    "User scheduler job failed"
                );
                Some(execution)
            }
            Err(e) => {
                error!(error = %e, "User scheduler job could not run");
                None
            }
        }
    }

    /// Spawn the daily timer. Returns a handle that can be used to abort it.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut after = Local::now().naive_local();
            loop {
                let fire_at = next_fire(after, self.at);
                let wait = (fire_at - Local::now().naive_local())
                    .to_std()
                    .unwrap_or_default();
                info!(next_run = %fire_at, "User purge scheduled");

                tokio::time::sleep(wait).await;
                self.run(Utc::now().naive_utc()).await;

                after = fire_at.max(Local::now().naive_local());
            }
        })
    }
}

/// The first moment strictly after `now` whose time of day is `at`.
pub fn next_fire(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}
