//! In-memory job store: an append-only log of jobs behind a lock.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::jobs::model::{Job, JobStatus, JobType, NewJob};
use crate::jobs::store::{JobStore, StatusUpdate};

/// Mirrors the Postgres store, including the single-live-job rule. Insertion
/// order stands in for `created_at` ordering so ties resolve deterministically.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<Vec<Job>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fully formed job as-is, bypassing the live-job check.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.push(job);
    }

    /// Simulates an outage: every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    fn check_available(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("job store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NewJob) -> anyhow::Result<Option<Uuid>> {
        self.check_available()?;
        let mut guard = self.jobs.write().await;

        let has_live = guard.iter().any(|j| {
            j.tenant_id == job.tenant_id && j.job_type == job.job_type && j.status.is_live()
        });
        if has_live {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        guard.push(Job {
            id,
            tenant_id: job.tenant_id,
            job_type: job.job_type,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            payload_json: job.payload_json,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            scheduled_at: job.scheduled_at,
        });
        Ok(Some(id))
    }

    async fn fetch_pending(
        &self,
        job_type: Option<JobType>,
        limit: i64,
    ) -> anyhow::Result<Vec<Job>> {
        self.check_available()?;
        let now = Utc::now();
        let guard = self.jobs.read().await;

        let mut pending: Vec<Job> = guard
            .iter()
            .filter(|j| j.is_runnable_at(now))
            .filter(|j| job_type.map_or(true, |t| j.job_type == t))
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        pending.sort_by_key(|j| j.created_at);
        pending.truncate(limit.max(1) as usize);
        Ok(pending)
    }

    async fn fetch_latest(
        &self,
        tenant_id: &str,
        job_type: JobType,
    ) -> anyhow::Result<Option<Job>> {
        self.check_available()?;
        let guard = self.jobs.read().await;

        let latest = guard
            .iter()
            .enumerate()
            .filter(|(_, j)| j.tenant_id == tenant_id && j.job_type == job_type)
            .max_by_key(|(idx, j)| (j.created_at, *idx))
            .map(|(_, j)| j.clone());
        Ok(latest)
    }

    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> anyhow::Result<()> {
        self.check_available()?;
        let mut guard = self.jobs.write().await;

        let job = guard
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| anyhow::anyhow!("job {job_id} not found"))?;

        job.status = update.status;
        if let Some(attempts) = update.attempts {
            job.attempts = attempts;
        }
        if let Some(at) = update.started_at {
            job.started_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            job.completed_at = Some(at);
        }
        if let Some(at) = update.scheduled_at {
            job.scheduled_at = Some(at);
        }
        if update.status == JobStatus::Completed {
            job.error = None;
        } else if let Some(err) = update.error {
            job.error = Some(err);
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        self.check_available()?;
        let guard = self.jobs.read().await;
        Ok(guard.iter().find(|j| j.id == job_id).cloned())
    }
}
