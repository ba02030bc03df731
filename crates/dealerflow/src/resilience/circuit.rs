// Circuit breaker per job type.
//
// States:
// - Closed: executions proceed, failures counted in a rolling window
// - Open: executions fast-fail until the cooldown elapses
// - HalfOpen: a single trial execution decides between Closed and Open

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CircuitOpenError;
use crate::jobs::error_codes::ErrorKind;
use crate::jobs::model::JobType;
use crate::resilience::policy::ResiliencePolicies;

#[derive(Debug, Clone)]
enum CircuitState {
    Closed,
    Open {
        since: Instant,
        opened_at: DateTime<Utc>,
    },
    HalfOpen {
        trial_in_flight: bool,
        opened_at: DateTime<Utc>,
    },
}

#[derive(Debug)]
struct CircuitEntry {
    state: CircuitState,
    failures: VecDeque<Instant>,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStateKind {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of one job type's circuit.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub job_type: JobType,
    pub state: CircuitStateKind,
    pub failure_count: usize,
    pub opened_at: Option<DateTime<Utc>>,
    pub threshold: usize,
    pub cooldown_ms: u128,
    pub retryable_error_kinds: Vec<ErrorKind>,
}

/// Process-local, never persisted. Entries are created on first failure.
pub struct CircuitBreaker {
    policies: ResiliencePolicies,
    entries: Mutex<HashMap<JobType, CircuitEntry>>,
}

impl CircuitBreaker {
    pub fn new(policies: ResiliencePolicies) -> Self {
        Self {
            policies,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policies(&self) -> &ResiliencePolicies {
        &self.policies
    }

    /// Admits or fast-fails one execution of `job_type`. An admission in the
    /// half-open state is the single trial; its outcome must be reported via
    /// `record_success`, `record_failure` or `release`.
    pub async fn try_acquire(&self, job_type: JobType) -> Result<(), CircuitOpenError> {
        let policy = self.policies.for_type(job_type);
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get_mut(&job_type) else {
            return Ok(());
        };

        match entry.state.clone() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open { since, opened_at } => {
                let elapsed = since.elapsed();
                if elapsed >= policy.cooldown {
                    entry.state = CircuitState::HalfOpen {
                        trial_in_flight: true,
                        opened_at,
                    };
                    tracing::info!(job_type = %job_type, "circuit half-open, admitting trial execution");
                    Ok(())
                } else {
                    Err(CircuitOpenError {
                        job_type,
                        retry_after: policy.cooldown - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen {
                trial_in_flight: true,
                ..
            } => Err(CircuitOpenError {
                job_type,
                retry_after: policy.cooldown,
            }),
            CircuitState::HalfOpen {
                trial_in_flight: false,
                opened_at,
            } => {
                entry.state = CircuitState::HalfOpen {
                    trial_in_flight: true,
                    opened_at,
                };
                Ok(())
            }
        }
    }

    pub async fn record_success(&self, job_type: JobType) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&job_type) else {
            return;
        };

        if let CircuitState::HalfOpen { .. } = entry.state {
            entry.state = CircuitState::Closed;
            entry.failures.clear();
            tracing::info!(job_type = %job_type, "circuit closed after successful trial");
        }
    }

    pub async fn record_failure(&self, job_type: JobType) {
        let policy = self.policies.for_type(job_type);
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(job_type).or_insert_with(CircuitEntry::new);

        entry.failures.push_back(now);
        entry.prune(now, policy.window);

        match entry.state {
            CircuitState::Closed => {
                if entry.failures.len() >= policy.failure_threshold {
                    entry.state = CircuitState::Open {
                        since: now,
                        opened_at: Utc::now(),
                    };
                    tracing::warn!(
                        job_type = %job_type,
                        failures = entry.failures.len(),
                        threshold = policy.failure_threshold,
                        cooldown_ms = policy.cooldown.as_millis() as u64,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen { .. } => {
                entry.state = CircuitState::Open {
                    since: now,
                    opened_at: Utc::now(),
                };
                tracing::warn!(job_type = %job_type, "trial execution failed, circuit re-opened");
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Gives back a half-open trial that never reached the executor.
    pub async fn release(&self, job_type: JobType) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&job_type) {
            if let CircuitState::HalfOpen { opened_at, .. } = entry.state {
                entry.state = CircuitState::HalfOpen {
                    trial_in_flight: false,
                    opened_at,
                };
            }
        }
    }

    pub async fn snapshot(&self, job_type: JobType) -> CircuitSnapshot {
        let policy = self.policies.for_type(job_type);
        let mut entries = self.entries.lock().await;

        let (state, failure_count, opened_at) = match entries.get_mut(&job_type) {
            None => (CircuitStateKind::Closed, 0, None),
            Some(entry) => {
                entry.prune(Instant::now(), policy.window);
                match entry.state {
                    CircuitState::Closed => (CircuitStateKind::Closed, entry.failures.len(), None),
                    CircuitState::Open { opened_at, .. } => {
                        (CircuitStateKind::Open, entry.failures.len(), Some(opened_at))
                    }
                    CircuitState::HalfOpen { opened_at, .. } => {
                        (CircuitStateKind::HalfOpen, entry.failures.len(), Some(opened_at))
                    }
                }
            }
        };

        CircuitSnapshot {
            job_type,
            state,
            failure_count,
            opened_at,
            threshold: policy.failure_threshold,
            cooldown_ms: policy.cooldown.as_millis(),
            retryable_error_kinds: policy.retryable_kinds.clone(),
        }
    }
}
