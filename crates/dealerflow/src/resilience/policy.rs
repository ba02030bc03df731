use std::collections::HashMap;
use std::time::Duration;

use crate::jobs::error_codes::ErrorKind;
use crate::jobs::model::JobType;

/// Breaker and retry tuning for one job type.
#[derive(Debug, Clone)]
pub struct JobTypePolicy {
    /// Failures within `window` that open the circuit.
    pub failure_threshold: usize,
    pub cooldown: Duration,
    pub window: Duration,
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for JobTypePolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
            window: Duration::from_secs(600),
            retryable_kinds: vec![
                ErrorKind::Timeout,
                ErrorKind::RateLimit,
                ErrorKind::ServerError,
                ErrorKind::DependencyDown,
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResiliencePolicies {
    pub default: JobTypePolicy,
    pub overrides: HashMap<JobType, JobTypePolicy>,
}

impl ResiliencePolicies {
    pub fn new(default: JobTypePolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, job_type: JobType, policy: JobTypePolicy) -> Self {
        self.overrides.insert(job_type, policy);
        self
    }

    pub fn for_type(&self, job_type: JobType) -> &JobTypePolicy {
        self.overrides.get(&job_type).unwrap_or(&self.default)
    }
}
