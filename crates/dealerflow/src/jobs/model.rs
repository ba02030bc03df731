use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The fixed set of per-tenant pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FeedIngest,
    FeedEnrich,
    DetailEnrich,
    LinkPublish,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::FeedIngest,
        JobType::FeedEnrich,
        JobType::DetailEnrich,
        JobType::LinkPublish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FeedIngest => "feed_ingest",
            JobType::FeedEnrich => "feed_enrich",
            JobType::DetailEnrich => "detail_enrich",
            JobType::LinkPublish => "link_publish",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "feed_ingest" => Some(JobType::FeedIngest),
            "feed_enrich" => Some(JobType::FeedEnrich),
            "detail_enrich" => Some(JobType::DetailEnrich),
            "link_publish" => Some(JobType::LinkPublish),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retry,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retry => "retry",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "retry" => Some(JobStatus::Retry),
            _ => None,
        }
    }

    /// Live jobs occupy the single (tenant, job type) slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Processing | JobStatus::Retry
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload_json: Value,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Pending work: a pending or retry job whose next eligible time has come.
    pub fn is_runnable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Retry)
            && self.scheduled_at.map_or(true, |at| at <= now)
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub tenant_id: String,
    pub job_type: JobType,
    pub payload_json: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_attempts: i32,
}

impl NewJob {
    pub fn now(tenant_id: impl Into<String>, job_type: JobType, payload_json: Value) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            job_type,
            payload_json,
            scheduled_at: None,
            max_attempts: 3,
        }
    }

    pub fn max_attempts(mut self, n: i32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }
}
