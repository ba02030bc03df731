use dealerflow::jobs::registry::{boxed, parse_payload, ExecContext, ExecutorOptions, ExecutorRegistry};
use dealerflow::jobs::{ErrorKind, Job, JobType};
use dealerflow::JobExecutionError;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

#[derive(Deserialize)]
struct FeedPayload {
    feed_url: String,
    /// Forces a failure of the given kind, for exercising retry and breaker paths.
    simulate_error: Option<String>,
}

async fn simulated_upstream_call(
    job: &Job,
    ctx: &ExecContext,
    work: Duration,
) -> Result<(), JobExecutionError> {
    let payload: FeedPayload = parse_payload(job)?;

    tracing::debug!(
        worker_id = %ctx.worker_id,
        tenant_id = %job.tenant_id,
        job_type = %job.job_type,
        feed_url = %payload.feed_url,
        "calling upstream"
    );
    tokio::time::sleep(work).await;

    match payload.simulate_error {
        Some(code) => Err(JobExecutionError::new(
            ErrorKind::from_str(&code),
            format!("simulated {code} from {}", payload.feed_url),
        )),
        None => Ok(()),
    }
}

pub fn build_registry() -> Arc<ExecutorRegistry> {
    let mut registry = ExecutorRegistry::new();

    // Demo executors. Real feed parsing and link publishing plug in here.
    registry.register_with_options(
        JobType::FeedIngest,
        |job, ctx| boxed(simulated_upstream_call(job, ctx, Duration::from_millis(300))),
        ExecutorOptions::new().timeout(Duration::from_secs(60)),
    );
    registry.register_with_options(
        JobType::FeedEnrich,
        |job, ctx| boxed(simulated_upstream_call(job, ctx, Duration::from_millis(200))),
        ExecutorOptions::new().timeout(Duration::from_secs(30)),
    );
    registry.register_with_options(
        JobType::DetailEnrich,
        |job, ctx| boxed(simulated_upstream_call(job, ctx, Duration::from_millis(500))),
        ExecutorOptions::new()
            .max_concurrency(4)
            .timeout(Duration::from_secs(120)),
    );
    registry.register_with_options(
        JobType::LinkPublish,
        |job, ctx| boxed(simulated_upstream_call(job, ctx, Duration::from_millis(100))),
        ExecutorOptions::new()
            .max_concurrency(2)
            .timeout(Duration::from_secs(15)),
    );

    Arc::new(registry)
}
