mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{approx_eq, pending, status_of, Script};
use dealerflow::events::TracingEventSink;
use dealerflow::jobs::retry::{Disposition, RetryConfig, TerminalReason};
use dealerflow::jobs::{
    ErrorKind, ExecContext, ExecutorRegistry, InMemoryJobStore, JobOutcome, JobRunner, JobStatus,
    JobStore, JobType, StatusUpdate,
};
use dealerflow::resilience::{CircuitBreaker, CircuitStateKind, JobTypePolicy, ResiliencePolicies};
use uuid::Uuid;

fn ctx() -> ExecContext {
    ExecContext {
        worker_id: "test-worker".into(),
        pass_id: Uuid::new_v4(),
    }
}

fn runner_with(
    store: &Arc<InMemoryJobStore>,
    registry: Arc<ExecutorRegistry>,
    policy: JobTypePolicy,
) -> JobRunner {
    JobRunner::new(
        store.clone(),
        registry,
        Arc::new(CircuitBreaker::new(ResiliencePolicies::new(policy))),
        RetryConfig::default(),
        Arc::new(TracingEventSink),
    )
}

/// Makes a retry-scheduled job runnable again without waiting out its delay.
async fn make_due(store: &InMemoryJobStore, id: Uuid) {
    store
        .update_status(id, StatusUpdate::retry(Utc::now() - chrono::Duration::seconds(1), "due"))
        .await
        .unwrap();
}

#[tokio::test]
async fn retryable_failure_backs_off_then_fails_terminally() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::FeedIngest, ErrorKind::Timeout);
    let runner = runner_with(&store, script.registry(), JobTypePolicy::default());

    let job = pending("t1", JobType::FeedIngest, 10);
    let id = job.id;
    store.insert(job).await;

    // attempt 1 of 3: retry in 1s
    let before = Utc::now();
    let job = status_of(&store, id).await;
    let outcome = runner.run(&job, &ctx()).await.unwrap();
    let JobOutcome::Failed { error, disposition } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert!(matches!(disposition, Disposition::Retry { delay_ms: 1_000, .. }));

    let job = status_of(&store, id).await;
    assert_eq!(job.status, JobStatus::Retry);
    assert_eq!(job.attempts, 1);
    assert!(approx_eq(
        job.scheduled_at.unwrap(),
        before + chrono::Duration::seconds(1),
        500
    ));
    assert!(job.error.as_deref().unwrap().contains("TIMEOUT"));
    assert!(!job.is_runnable_at(Utc::now()));

    // attempt 2: retry in 2s
    make_due(&store, id).await;
    let job = status_of(&store, id).await;
    let outcome = runner.run(&job, &ctx()).await.unwrap();
    assert!(matches!(
        outcome,
        JobOutcome::Failed {
            disposition: Disposition::Retry { delay_ms: 2_000, .. },
            ..
        }
    ));

    // attempt 3: out of attempts
    make_due(&store, id).await;
    let job = status_of(&store, id).await;
    let scheduled_before = job.scheduled_at;
    let outcome = runner.run(&job, &ctx()).await.unwrap();
    assert!(matches!(
        outcome,
        JobOutcome::Failed {
            disposition: Disposition::Terminal {
                reason: TerminalReason::MaxAttemptsExceeded
            },
            ..
        }
    ));

    let job = status_of(&store, id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(job.scheduled_at, scheduled_before);
    assert!(job.error.is_some());
    assert_eq!(script.calls_for(JobType::FeedIngest), 3);
}

#[tokio::test]
async fn non_retryable_failure_is_terminal_on_first_attempt() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::FeedEnrich, ErrorKind::BadPayload);
    let runner = runner_with(&store, script.registry(), JobTypePolicy::default());

    let job = pending("t1", JobType::FeedEnrich, 10);
    store.insert(job.clone()).await;

    let outcome = runner.run(&job, &ctx()).await.unwrap();
    assert!(matches!(
        outcome,
        JobOutcome::Failed {
            disposition: Disposition::Terminal {
                reason: TerminalReason::NonRetryable
            },
            ..
        }
    ));

    let stored = status_of(&store, job.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn unclassified_errors_are_terminal() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::DetailEnrich, ErrorKind::Unknown);
    let runner = runner_with(&store, script.registry(), JobTypePolicy::default());

    let job = pending("t1", JobType::DetailEnrich, 10);
    store.insert(job.clone()).await;

    runner.run(&job, &ctx()).await.unwrap();
    assert_eq!(status_of(&store, job.id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn per_type_allow_list_overrides_default() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::LinkPublish, ErrorKind::NotFound);
    let policies = ResiliencePolicies::default().with_override(
        JobType::LinkPublish,
        JobTypePolicy {
            retryable_kinds: vec![ErrorKind::NotFound],
            ..JobTypePolicy::default()
        },
    );
    let runner = JobRunner::new(
        store.clone(),
        script.registry(),
        Arc::new(CircuitBreaker::new(policies)),
        RetryConfig::default(),
        Arc::new(TracingEventSink),
    );

    let job = pending("t1", JobType::LinkPublish, 10);
    store.insert(job.clone()).await;

    runner.run(&job, &ctx()).await.unwrap();
    assert_eq!(status_of(&store, job.id).await.status, JobStatus::Retry);
}

#[tokio::test]
async fn missing_executor_fails_with_unknown_job_type() {
    let store = Arc::new(InMemoryJobStore::new());
    let runner = runner_with(
        &store,
        Arc::new(ExecutorRegistry::new()),
        JobTypePolicy::default(),
    );

    let job = pending("t1", JobType::FeedIngest, 10);
    store.insert(job.clone()).await;

    let outcome = runner.run(&job, &ctx()).await.unwrap();
    let JobOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::UnknownJobType);
    assert_eq!(status_of(&store, job.id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn success_completes_and_clears_previous_error() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    let runner = runner_with(&store, script.registry(), JobTypePolicy::default());

    let mut job = pending("t1", JobType::FeedIngest, 10);
    job.status = JobStatus::Retry;
    job.attempts = 1;
    job.error = Some("SERVER_ERROR: upstream 503".into());
    store.insert(job.clone()).await;

    let outcome = runner.run(&job, &ctx()).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Succeeded { .. }));

    let stored = status_of(&store, job.id).await;
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempts, 2);
    assert!(stored.error.is_none());
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn open_circuit_fast_fails_without_calling_executor() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::FeedIngest, ErrorKind::ServerError);
    let runner = runner_with(
        &store,
        script.registry(),
        JobTypePolicy {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            ..JobTypePolicy::default()
        },
    );

    for i in 0..3 {
        let job = pending(&format!("t{i}"), JobType::FeedIngest, 10);
        store.insert(job.clone()).await;
        runner.run(&job, &ctx()).await.unwrap();
    }
    assert_eq!(script.calls_for(JobType::FeedIngest), 3);
    assert_eq!(
        runner.breaker().snapshot(JobType::FeedIngest).await.state,
        CircuitStateKind::Open
    );

    let job = pending("t9", JobType::FeedIngest, 10);
    store.insert(job.clone()).await;
    let before = Utc::now();
    let outcome = runner.run(&job, &ctx()).await.unwrap();

    let JobOutcome::Rejected { retry_after } = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert!(retry_after <= Duration::from_secs(60));
    assert_eq!(script.calls_for(JobType::FeedIngest), 3);

    let stored = status_of(&store, job.id).await;
    assert_eq!(stored.status, JobStatus::Retry);
    assert_eq!(stored.attempts, 0);
    assert!(approx_eq(
        stored.scheduled_at.unwrap(),
        before + chrono::Duration::seconds(60),
        1_000
    ));

    // other job types keep running
    let other = pending("t9", JobType::FeedEnrich, 5);
    store.insert(other.clone()).await;
    assert!(matches!(
        runner.run(&other, &ctx()).await.unwrap(),
        JobOutcome::Succeeded { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn successful_trial_closes_circuit() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::DetailEnrich, ErrorKind::DependencyDown);
    let runner = runner_with(
        &store,
        script.registry(),
        JobTypePolicy {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
            ..JobTypePolicy::default()
        },
    );

    let first = pending("t1", JobType::DetailEnrich, 10);
    store.insert(first.clone()).await;
    runner.run(&first, &ctx()).await.unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;
    script.succeed(JobType::DetailEnrich);

    let second = pending("t2", JobType::DetailEnrich, 10);
    store.insert(second.clone()).await;
    let outcome = runner.run(&second, &ctx()).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Succeeded { .. }));

    let snap = runner.breaker().snapshot(JobType::DetailEnrich).await;
    assert_eq!(snap.state, CircuitStateKind::Closed);
    assert_eq!(snap.failure_count, 0);
}

#[tokio::test]
async fn job_can_exhaust_retries_while_circuit_stays_closed() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.fail(JobType::FeedIngest, ErrorKind::RateLimit);
    let runner = runner_with(&store, script.registry(), JobTypePolicy::default());

    let mut job = pending("t1", JobType::FeedIngest, 10);
    job.max_attempts = 1;
    store.insert(job.clone()).await;

    runner.run(&job, &ctx()).await.unwrap();
    assert_eq!(status_of(&store, job.id).await.status, JobStatus::Failed);
    assert_eq!(
        runner.breaker().snapshot(JobType::FeedIngest).await.state,
        CircuitStateKind::Closed
    );
}

#[tokio::test(start_paused = true)]
async fn panicking_trial_reopens_circuit_and_fails_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let script = Script::new();
    script.panic_on(JobType::FeedIngest);
    let runner = runner_with(
        &store,
        script.registry(),
        JobTypePolicy {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
            ..JobTypePolicy::default()
        },
    );

    let first = pending("t1", JobType::FeedIngest, 10);
    store.insert(first.clone()).await;
    runner.run(&first, &ctx()).await.unwrap();
    assert_eq!(
        runner.breaker().snapshot(JobType::FeedIngest).await.state,
        CircuitStateKind::Open
    );

    // half-open trial panics too
    tokio::time::advance(Duration::from_secs(11)).await;
    let trial = pending("t2", JobType::FeedIngest, 10);
    store.insert(trial.clone()).await;
    let outcome = runner.run(&trial, &ctx()).await.unwrap();

    let JobOutcome::Failed { error, disposition } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.kind, ErrorKind::Unknown);
    assert!(error.message.contains("executor panicked"));
    assert_eq!(
        disposition,
        Disposition::Terminal {
            reason: TerminalReason::NonRetryable
        }
    );

    let stored = status_of(&store, trial.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert_eq!(
        runner.breaker().snapshot(JobType::FeedIngest).await.state,
        CircuitStateKind::Open
    );

    // the trial slot was not leaked: the next cooldown admits a new trial
    tokio::time::advance(Duration::from_secs(11)).await;
    script.succeed(JobType::FeedIngest);
    let third = pending("t3", JobType::FeedIngest, 10);
    store.insert(third.clone()).await;
    assert!(matches!(
        runner.run(&third, &ctx()).await.unwrap(),
        JobOutcome::Succeeded { .. }
    ));
    assert_eq!(
        runner.breaker().snapshot(JobType::FeedIngest).await.state,
        CircuitStateKind::Closed
    );
}
