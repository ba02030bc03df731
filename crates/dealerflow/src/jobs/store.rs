use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::model::{Job, JobStatus, JobType, NewJob};

/// Field changes applied together with a status transition.
///
/// `None` leaves the stored value untouched. A transition to `completed`
/// always clears the stored error.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub attempts: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StatusUpdate {
    fn bare(status: JobStatus) -> Self {
        Self {
            status,
            attempts: None,
            started_at: None,
            completed_at: None,
            scheduled_at: None,
            error: None,
        }
    }

    pub fn processing(now: DateTime<Utc>, attempts: i32) -> Self {
        Self {
            attempts: Some(attempts),
            started_at: Some(now),
            ..Self::bare(JobStatus::Processing)
        }
    }

    pub fn completed(now: DateTime<Utc>) -> Self {
        Self {
            completed_at: Some(now),
            ..Self::bare(JobStatus::Completed)
        }
    }

    pub fn retry(scheduled_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            scheduled_at: Some(scheduled_at),
            error: Some(error.into()),
            ..Self::bare(JobStatus::Retry)
        }
    }

    pub fn failed(now: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            completed_at: Some(now),
            error: Some(error.into()),
            ..Self::bare(JobStatus::Failed)
        }
    }
}

/// Persistent job store. Assumed read-after-write consistent for one process;
/// each call is an atomic, visible operation.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a job unless a live job of the same (tenant, type) exists.
    async fn enqueue(&self, job: NewJob) -> anyhow::Result<Option<Uuid>>;

    /// Runnable pending/retry jobs, oldest first.
    async fn fetch_pending(&self, job_type: Option<JobType>, limit: i64)
        -> anyhow::Result<Vec<Job>>;

    /// Most recently created job of this type for the tenant, in any status.
    async fn fetch_latest(&self, tenant_id: &str, job_type: JobType)
        -> anyhow::Result<Option<Job>>;

    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> anyhow::Result<()>;

    async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<Job>>;
}
