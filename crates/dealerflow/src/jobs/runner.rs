use chrono::Utc;
use futures::FutureExt;
use rand::{rngs::StdRng, SeedableRng};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::JobExecutionError;
use crate::events::{notify, EventSink, LifecycleEvent};
use crate::jobs::error_codes::ErrorKind;
use crate::jobs::model::Job;
use crate::jobs::registry::{ExecContext, ExecutorRegistry};
use crate::jobs::retry::{decide, Disposition, RetryConfig};
use crate::jobs::store::{JobStore, StatusUpdate};
use crate::resilience::CircuitBreaker;

/// Result of pushing one job through the resilience layer.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { latency_ms: u64 },
    Failed {
        error: JobExecutionError,
        disposition: Disposition,
    },
    /// Circuit open: executor not invoked, attempt count untouched.
    Rejected { retry_after: Duration },
}

/// Runs single jobs: circuit admission, status bookkeeping, executor call,
/// then retry-or-fail on error.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    registry: Arc<ExecutorRegistry>,
    breaker: Arc<CircuitBreaker>,
    retry_cfg: RetryConfig,
    events: Arc<dyn EventSink>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ExecutorRegistry>,
        breaker: Arc<CircuitBreaker>,
        retry_cfg: RetryConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            registry,
            breaker,
            retry_cfg,
            events,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Errors returned here are store failures; executor failures are folded
    /// into the outcome.
    pub async fn run(&self, job: &Job, ctx: &ExecContext) -> anyhow::Result<JobOutcome> {
        // 1) circuit admission
        if let Err(open) = self.breaker.try_acquire(job.job_type).await {
            let now = Utc::now();
            let retry_at = now
                + chrono::Duration::from_std(open.retry_after)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1));
            self.store
                .update_status(job.id, StatusUpdate::retry(retry_at, open.to_string()))
                .await?;

            tracing::debug!(
                job_id = %job.id,
                tenant_id = %job.tenant_id,
                job_type = %job.job_type,
                retry_after_ms = open.retry_after.as_millis() as u64,
                "circuit open, job fast-failed"
            );
            notify(
                self.events.as_ref(),
                LifecycleEvent::JobRejected {
                    job_id: job.id,
                    tenant_id: job.tenant_id.clone(),
                    job_type: job.job_type,
                    retry_after_ms: open.retry_after.as_millis() as u64,
                },
            )
            .await;
            return Ok(JobOutcome::Rejected {
                retry_after: open.retry_after,
            });
        }

        // 2) claim
        let attempt = job.attempts + 1;
        if let Err(e) = self
            .store
            .update_status(job.id, StatusUpdate::processing(Utc::now(), attempt))
            .await
        {
            self.breaker.release(job.job_type).await;
            return Err(e);
        }
        notify(
            self.events.as_ref(),
            LifecycleEvent::JobStarted {
                job_id: job.id,
                tenant_id: job.tenant_id.clone(),
                job_type: job.job_type,
                attempt,
            },
        )
        .await;

        // 3) execute
        let start = Instant::now();
        let result = match self.registry.executor_for(job.job_type) {
            Some(entry) => AssertUnwindSafe(entry.run(job, ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(&panic);
                    tracing::error!(
                        job_id = %job.id,
                        tenant_id = %job.tenant_id,
                        job_type = %job.job_type,
                        panic = %message,
                        "executor panicked"
                    );
                    Err(JobExecutionError::new(
                        ErrorKind::Unknown,
                        format!("executor panicked: {message}"),
                    ))
                }),
            None => Err(JobExecutionError::new(
                ErrorKind::UnknownJobType,
                format!("no executor for job_type={}", job.job_type),
            )),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        // 4) record
        match result {
            Ok(()) => {
                self.breaker.record_success(job.job_type).await;
                self.store
                    .update_status(job.id, StatusUpdate::completed(Utc::now()))
                    .await?;

                tracing::info!(
                    job_id = %job.id,
                    tenant_id = %job.tenant_id,
                    job_type = %job.job_type,
                    attempt,
                    latency_ms,
                    "job completed"
                );
                notify(
                    self.events.as_ref(),
                    LifecycleEvent::JobCompleted {
                        job_id: job.id,
                        tenant_id: job.tenant_id.clone(),
                        job_type: job.job_type,
                        latency_ms,
                    },
                )
                .await;
                Ok(JobOutcome::Succeeded { latency_ms })
            }
            Err(err) => {
                self.breaker.record_failure(job.job_type).await;
                let disposition = self.on_failure(job, attempt, &err).await?;
                Ok(JobOutcome::Failed {
                    error: err,
                    disposition,
                })
            }
        }
    }

    async fn on_failure(
        &self,
        job: &Job,
        attempt: i32,
        err: &JobExecutionError,
    ) -> anyhow::Result<Disposition> {
        let policy = self.breaker.policies().for_type(job.job_type);
        let now = Utc::now();
        let mut rng = StdRng::from_entropy();
        let disposition = decide(
            err.kind,
            attempt,
            job.max_attempts,
            &policy.retryable_kinds,
            &self.retry_cfg,
            now,
            &mut rng,
        );

        match disposition {
            Disposition::Retry {
                scheduled_at,
                delay_ms,
            } => {
                self.store
                    .update_status(job.id, StatusUpdate::retry(scheduled_at, err.to_string()))
                    .await?;
                tracing::warn!(
                    job_id = %job.id,
                    tenant_id = %job.tenant_id,
                    job_type = %job.job_type,
                    attempt,
                    delay_ms,
                    code = err.kind.as_str(),
                    "job failed, retry scheduled"
                );
            }
            Disposition::Terminal { reason } => {
                self.store
                    .update_status(job.id, StatusUpdate::failed(now, err.to_string()))
                    .await?;
                tracing::warn!(
                    job_id = %job.id,
                    tenant_id = %job.tenant_id,
                    job_type = %job.job_type,
                    attempt,
                    code = err.kind.as_str(),
                    reason = reason.as_str(),
                    "job failed terminally"
                );
            }
        }

        notify(
            self.events.as_ref(),
            LifecycleEvent::JobFailed {
                job_id: job.id,
                tenant_id: job.tenant_id.clone(),
                job_type: job.job_type,
                error: err.to_string(),
                disposition,
            },
        )
        .await;

        Ok(disposition)
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
