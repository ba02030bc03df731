//! Error taxonomy for scheduling passes, job execution and planning.

use std::time::Duration;

use crate::graph::dependency::NodeId;
use crate::jobs::error_codes::ErrorKind;
use crate::jobs::model::JobType;

/// Pass-level failures. Anything here means the pass never started executing.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to build dependency graph: {0:#}")]
    GraphBuild(#[source] anyhow::Error),
}

/// Cycles found in the dependency graph. Logged, never fatal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("dependency cycle detected: {}", format_cycles(.cycles))]
pub struct DependencyCycleError {
    pub cycles: Vec<Vec<NodeId>>,
}

fn format_cycles(cycles: &[Vec<NodeId>]) -> String {
    cycles
        .iter()
        .map(|c| {
            c.iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure reported by a job executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Fast-fail: the job type's circuit is open and the executor was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit open for job_type={job_type}, retry after {retry_after:?}")]
pub struct CircuitOpenError {
    pub job_type: JobType,
    pub retry_after: Duration,
}

/// Bad planner or precedence input. Callers recover with documented defaults,
/// except for precedence cycles which are rejected at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unmapped timezone: {0}")]
    UnknownTimezone(String),
    #[error("unknown priority tier: {0}")]
    UnknownTier(String),
    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),
    #[error("invalid local time (expected HH:MM): {0}")]
    InvalidLocalTime(String),
    #[error("precedence table contains a cycle: {0}")]
    PrecedenceCycle(String),
}
