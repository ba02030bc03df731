use serde::Serialize;
use uuid::Uuid;

use crate::graph::NodeId;
use crate::jobs::model::JobType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rescheduled with backoff.
    Retry,
    /// Marked `failed`.
    Terminal,
    /// Fast-failed by an open circuit.
    CircuitOpen,
    /// The store rejected a status update mid-job.
    Store,
    /// A tenant task died before reporting.
    TenantTask,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job_id: Option<Uuid>,
    pub tenant_id: String,
    pub job_type: Option<JobType>,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one pass. Tenant tasks fill their own copy; copies are merged
/// at each batch join.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub processed: usize,
    pub succeeded: usize,
    /// Every non-successful attempt: retried + terminal + circuit_rejected + store errors.
    pub failed: usize,
    pub retried: usize,
    pub terminal: usize,
    pub circuit_rejected: usize,
    pub blocked: usize,
    pub tenants_touched: usize,
    pub batches: usize,
    pub wall_clock_ms: u64,
    pub budget_exhausted: bool,
    pub deadline_reached: bool,
    pub cycles: Vec<Vec<NodeId>>,
    pub errors: Vec<JobFailure>,
}

impl PassSummary {
    pub fn merge(&mut self, other: PassSummary) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.retried += other.retried;
        self.terminal += other.terminal;
        self.circuit_rejected += other.circuit_rejected;
        self.blocked += other.blocked;
        self.tenants_touched += other.tenants_touched;
        self.deadline_reached |= other.deadline_reached;
        self.errors.extend(other.errors);
    }

    pub(crate) fn record_failure(&mut self, failure: JobFailure) {
        if failure.kind == FailureKind::TenantTask {
            self.errors.push(failure);
            return;
        }
        self.processed += 1;
        self.failed += 1;
        match failure.kind {
            FailureKind::Retry => self.retried += 1,
            FailureKind::Terminal => self.terminal += 1,
            FailureKind::CircuitOpen => self.circuit_rejected += 1,
            FailureKind::Store | FailureKind::TenantTask => {}
        }
        self.errors.push(failure);
    }
}
