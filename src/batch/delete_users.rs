use chrono::{Months, NaiveDateTime};
use futures::future::BoxFuture;
use tracing::info;

use super::{BatchError, Job, JobParameters};
use crate::db::Database;

/// Registry name of the soft-deleted user purge.
pub const DELETE_USER_JOB: &str = "deleteUserJob";

/// Permanently removes users soft-deleted at least `retention_months` before
/// the run's `now`. Their posts and refresh token go with them.
pub struct DeleteUserJob {
    db: Database,
    retention_months: u32,
}

impl DeleteUserJob {
    pub fn new(db: Database, retention_months: u32) -> Self {
        Self {
            db,
            retention_months,
        }
    }

    /// Latest deletion time that is old enough to purge.
    pub fn cutoff(&self, now: NaiveDateTime) -> Result<NaiveDateTime, BatchError> {
        now.checked_sub_months(Months::new(self.retention_months))
            .ok_or_else(|| {
                BatchError::InvalidParameters(format!(
                    "{} minus {} months is out of range",
                    now, self.retention_months
                ))
            })
    }
}

impl Job for DeleteUserJob {
    fn name(&self) -> &'static str {
        DELETE_USER_JOB
    }

    fn execute<'a>(&'a self, params: &'a JobParameters) -> BoxFuture<'a, Result<u64, BatchError>> {
        Box::pin(async move {
            let cutoff = self.cutoff(params.now)?;
            let users = self.db.users();

            let candidates = users.find_deleted_before(cutoff).await?;
            if candidates.is_empty() {
                return Ok(0);
            }
            let user_ids: Vec<i64> = candidates.iter().map(|u| u.id).collect();

            let purged = users.purge_deleted_before(cutoff).await?;
            info!(count = purged, cutoff = %cutoff, user_ids = ?user_ids, "Purged deleted users");
            Ok(purged)
        })
    }
}
