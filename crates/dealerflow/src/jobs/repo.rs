// crates/dealerflow/src/jobs/repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::jobs::model::{Job, JobStatus, JobType, NewJob};
use crate::jobs::store::{JobStore, StatusUpdate};

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    tenant_id: String,
    job_type: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    payload_json: Value,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    scheduled_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> anyhow::Result<Self> {
        let job_type = JobType::from_str(&row.job_type)
            .ok_or_else(|| anyhow::anyhow!("unknown job_type={} for job {}", row.job_type, row.id))?;
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| anyhow::anyhow!("unknown status={} for job {}", row.status, row.id))?;

        Ok(Job {
            id: row.id,
            tenant_id: row.tenant_id,
            job_type,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            payload_json: row.payload_json,
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            scheduled_at: row.scheduled_at,
        })
    }
}

const JOB_COLUMNS: &str = r#"
    id, tenant_id, job_type, status, attempts, max_attempts, payload_json, error,
    created_at, started_at, completed_at, scheduled_at
"#;

/// Postgres-backed job store.
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Operator helpers
    // ----------------------------

    pub async fn reset(&self) -> anyhow::Result<()> {
        sqlx::query("TRUNCATE TABLE jobs RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn counts_by_status(&self) -> anyhow::Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM jobs
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl JobStore for JobsRepo {
    // ----------------------------
    // Enqueue
    // ----------------------------

    async fn enqueue(&self, job: NewJob) -> anyhow::Result<Option<Uuid>> {
        // The partial unique index on live (tenant_id, job_type) rows turns a
        // duplicate into a no-op.
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO jobs (tenant_id, job_type, status, attempts, max_attempts, payload_json, scheduled_at)
            VALUES ($1, $2, 'pending', 0, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&job.tenant_id)
        .bind(job.job_type.as_str())
        .bind(job.max_attempts)
        .bind(&job.payload_json)
        .bind(job.scheduled_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    async fn fetch_pending(
        &self,
        job_type: Option<JobType>,
        limit: i64,
    ) -> anyhow::Result<Vec<Job>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status IN ('pending', 'retry')
              AND (scheduled_at IS NULL OR scheduled_at <= now())
              AND ($1::text IS NULL OR job_type = $1)
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_type.map(|t| t.as_str()))
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn fetch_latest(
        &self,
        tenant_id: &str,
        job_type: JobType,
    ) -> anyhow::Result<Option<Job>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE tenant_id = $1 AND job_type = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(tenant_id)
            .bind(job_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    // ----------------------------
    // Transitions
    // ----------------------------

    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                attempts = COALESCE($3, attempts),
                started_at = COALESCE($4, started_at),
                completed_at = COALESCE($5, completed_at),
                scheduled_at = COALESCE($6, scheduled_at),
                error = CASE WHEN $2 = 'completed' THEN NULL ELSE COALESCE($7, error) END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(update.status.as_str())
        .bind(update.attempts)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.scheduled_at)
        .bind(update.error)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            anyhow::bail!("job {job_id} not found");
        }
        Ok(())
    }
}
