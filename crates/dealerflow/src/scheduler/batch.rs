use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{DependencyCycleError, SchedulerError};
use crate::events::{notify, EventSink, LifecycleEvent};
use crate::graph::{build_graph, DependencyGraph, PrecedenceTable};
use crate::jobs::registry::ExecContext;
use crate::jobs::retry::Disposition;
use crate::jobs::runner::{JobOutcome, JobRunner};
use crate::jobs::store::JobStore;
use crate::scheduler::summary::{FailureKind, JobFailure, PassSummary};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_tenants: usize,
    pub max_jobs_per_tenant: usize,
    /// Upper bound on pending jobs read per pass.
    pub pending_scan_limit: i64,
    /// No new batch or job starts once this much wall-clock time has passed.
    pub pass_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tenants: 5,
            max_jobs_per_tenant: 4,
            pending_scan_limit: 1_000,
            pass_timeout: None,
        }
    }
}

/// Splits tenants into consecutive batches of at most `size`.
pub fn partition_tenants<T: Clone>(tenants: &[T], size: usize) -> Vec<Vec<T>> {
    tenants.chunks(size.max(1)).map(|c| c.to_vec()).collect()
}

/// Drives one scheduling pass at a time: graph build, tenant batches,
/// sequential per-tenant execution through the job runner.
///
/// The ready set is computed once per tenant per pass. A job that completes
/// mid-pass unblocks its dependents on the next pass, not this one.
pub struct BatchScheduler {
    store: Arc<dyn JobStore>,
    table: PrecedenceTable,
    runner: JobRunner,
    events: Arc<dyn EventSink>,
    cfg: SchedulerConfig,
    worker_id: String,
}

impl BatchScheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        table: PrecedenceTable,
        runner: JobRunner,
        events: Arc<dyn EventSink>,
        cfg: SchedulerConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table,
            runner,
            events,
            cfg,
            worker_id: worker_id.into(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Builds this pass's dependency graph from current pending work.
    pub async fn build_graph(&self) -> Result<DependencyGraph, SchedulerError> {
        let pending = self
            .store
            .fetch_pending(None, self.cfg.pending_scan_limit)
            .await
            .map_err(SchedulerError::GraphBuild)?;

        build_graph(self.store.as_ref(), &self.table, &pending)
            .await
            .map_err(SchedulerError::GraphBuild)
    }

    /// Runs one pass with a processed-job budget. Only a failed graph build
    /// is an error; job and tenant failures end up in the summary.
    pub async fn run_pass(&self, budget: usize) -> Result<PassSummary, SchedulerError> {
        let started = Instant::now();
        let pass_id = Uuid::new_v4();
        let deadline = self.cfg.pass_timeout.map(|t| started + t);

        tracing::info!(%pass_id, budget, "scheduling pass started");
        notify(
            self.events.as_ref(),
            LifecycleEvent::PassStarted { pass_id, budget },
        )
        .await;

        let graph = match self.build_graph().await {
            Ok(graph) => Arc::new(graph),
            Err(e) => {
                tracing::error!(%pass_id, error = %e, "scheduling pass aborted");
                return Err(e);
            }
        };

        let mut summary = PassSummary {
            cycles: graph.cycles.clone(),
            ..PassSummary::default()
        };
        if !graph.cycles.is_empty() {
            let err = DependencyCycleError {
                cycles: graph.cycles.clone(),
            };
            tracing::warn!(%pass_id, error = %err, "cyclic nodes excluded from ready sets");
        }

        let ctx = ExecContext {
            worker_id: self.worker_id.clone(),
            pass_id,
        };

        for batch in partition_tenants(graph.tenants(), self.cfg.max_concurrent_tenants) {
            if summary.processed >= budget {
                summary.budget_exhausted = true;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                summary.deadline_reached = true;
                break;
            }

            summary.batches += 1;
            let mut handles = Vec::with_capacity(batch.len());

            for tenant_id in batch {
                let runner = self.runner.clone();
                let graph = Arc::clone(&graph);
                let ctx = ctx.clone();
                let max_jobs = self.cfg.max_jobs_per_tenant;
                let tenant = tenant_id.clone();

                let handle = tokio::spawn(async move {
                    run_tenant(&runner, &graph, &tenant, max_jobs, deadline, &ctx).await
                });
                handles.push((tenant_id, handle));
            }

            // barrier: every tenant task finishes before the next batch
            for (tenant_id, handle) in handles {
                match handle.await {
                    Ok(report) => summary.merge(report),
                    Err(e) => {
                        tracing::error!(%pass_id, tenant_id = %tenant_id, error = %e, "tenant task aborted");
                        summary.tenants_touched += 1;
                        summary.record_failure(JobFailure {
                            job_id: None,
                            tenant_id,
                            job_type: None,
                            kind: FailureKind::TenantTask,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        if summary.processed >= budget {
            summary.budget_exhausted = true;
        }
        summary.wall_clock_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            %pass_id,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            blocked = summary.blocked,
            tenants = summary.tenants_touched,
            batches = summary.batches,
            wall_clock_ms = summary.wall_clock_ms,
            "scheduling pass completed"
        );
        notify(
            self.events.as_ref(),
            LifecycleEvent::PassCompleted {
                pass_id,
                summary: summary.clone(),
            },
        )
        .await;

        Ok(summary)
    }
}

/// One tenant's share of a pass. Jobs run strictly one after another.
async fn run_tenant(
    runner: &JobRunner,
    graph: &DependencyGraph,
    tenant_id: &str,
    max_jobs: usize,
    deadline: Option<Instant>,
    ctx: &ExecContext,
) -> PassSummary {
    let mut report = PassSummary {
        tenants_touched: 1,
        ..PassSummary::default()
    };

    let blocked = graph.blocked(tenant_id);
    for (node, reason) in &blocked {
        tracing::debug!(node = %node, ?reason, "node blocked");
    }
    report.blocked = blocked.len();

    for job in graph.ready_set(tenant_id).into_iter().take(max_jobs) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            report.deadline_reached = true;
            break;
        }

        let failure = |kind: FailureKind, message: String| JobFailure {
            job_id: Some(job.id),
            tenant_id: job.tenant_id.clone(),
            job_type: Some(job.job_type),
            kind,
            message,
        };

        match runner.run(&job, ctx).await {
            Ok(JobOutcome::Succeeded { .. }) => {
                report.processed += 1;
                report.succeeded += 1;
            }
            Ok(JobOutcome::Failed { error, disposition }) => {
                let kind = match disposition {
                    Disposition::Retry { .. } => FailureKind::Retry,
                    Disposition::Terminal { .. } => FailureKind::Terminal,
                };
                report.record_failure(failure(kind, error.to_string()));
            }
            Ok(JobOutcome::Rejected { retry_after }) => {
                report.record_failure(failure(
                    FailureKind::CircuitOpen,
                    format!(
                        "circuit open for {}, retry after {}ms",
                        job.job_type,
                        retry_after.as_millis()
                    ),
                ));
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    tenant_id = %job.tenant_id,
                    job_type = %job.job_type,
                    error = %e,
                    "job store update failed"
                );
                report.record_failure(failure(FailureKind::Store, format!("{e:#}")));
            }
        }
    }

    report
}
