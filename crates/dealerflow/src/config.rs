use std::time::Duration;

use crate::jobs::retry::RetryConfig;
use crate::planner::TzMode;
use crate::resilience::{JobTypePolicy, ResiliencePolicies};
use crate::scheduler::SchedulerConfig;

/// Runtime configuration, loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub worker_id: String,
    pub migrate_on_startup: bool,

    pub pass_budget: usize,
    pub pass_interval: Duration,
    /// Run a single pass and exit instead of looping.
    pub run_once: bool,
    pub scheduler: SchedulerConfig,

    pub retry: RetryConfig,
    pub circuit: JobTypePolicy,

    pub tz_mode: TzMode,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let worker_id = env_var("DFLOW_WORKER_ID")
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker-1".to_string());

        let migrate_on_startup = env_bool("DFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        let pass_timeout = env_parse::<u64>("DFLOW_PASS_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let scheduler = SchedulerConfig {
            max_concurrent_tenants: env_parse("DFLOW_MAX_CONCURRENT_TENANTS").unwrap_or(5),
            max_jobs_per_tenant: env_parse("DFLOW_MAX_JOBS_PER_TENANT").unwrap_or(4),
            pending_scan_limit: env_parse("DFLOW_PENDING_SCAN_LIMIT").unwrap_or(1_000),
            pass_timeout,
        };

        let retry = RetryConfig {
            base_ms: env_parse("DFLOW_RETRY_BASE_MS").unwrap_or(1_000),
            cap_ms: env_parse("DFLOW_RETRY_CAP_MS").unwrap_or(30_000),
            jitter_pct: env_parse::<f64>("DFLOW_RETRY_JITTER_PCT")
                .unwrap_or(0.0)
                .clamp(0.0, 1.0),
        };

        let circuit = JobTypePolicy {
            failure_threshold: env_parse("DFLOW_CIRCUIT_THRESHOLD").unwrap_or(5),
            cooldown: Duration::from_secs(env_parse("DFLOW_CIRCUIT_COOLDOWN_SECS").unwrap_or(300)),
            window: Duration::from_secs(env_parse("DFLOW_CIRCUIT_WINDOW_SECS").unwrap_or(600)),
            ..JobTypePolicy::default()
        };

        let tz_mode = env_var("DFLOW_TZ_MODE")
            .and_then(|s| TzMode::from_str(&s))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            worker_id,
            migrate_on_startup,
            pass_budget: env_parse("DFLOW_PASS_BUDGET").unwrap_or(200),
            pass_interval: Duration::from_secs(env_parse::<u64>("DFLOW_PASS_INTERVAL_SECS").unwrap_or(60).max(1)),
            run_once: env_bool("DFLOW_RUN_ONCE").unwrap_or(false),
            scheduler,
            retry,
            circuit,
            tz_mode,
        })
    }

    pub fn resilience_policies(&self) -> ResiliencePolicies {
        ResiliencePolicies::new(self.circuit.clone())
    }
}

/// Reads `DFLOW_FOO`, falling back to the unprefixed `FOO`. Blank values count as unset.
fn env_var(key: &str) -> Option<String> {
    lookup_prefixed(key, |name| std::env::var(name).ok())
}

fn lookup_prefixed(key: &str, get: impl Fn(&str) -> Option<String>) -> Option<String> {
    let present = |name: &str| get(name).filter(|s| !s.trim().is_empty());
    present(key).or_else(|| {
        key.strip_prefix("DFLOW_")
            .and_then(|unprefixed| present(unprefixed))
    })
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_var(key).map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
