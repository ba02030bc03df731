use serde::de::DeserializeOwned;
use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};
use tokio::{sync::Semaphore, time::timeout};
use uuid::Uuid;

use crate::error::JobExecutionError;
use crate::jobs::error_codes::ErrorKind;
use crate::jobs::model::{Job, JobType};

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
type ExecutorFn = dyn for<'a> Fn(&'a Job, &'a ExecContext) -> BoxFuture<'a, Result<(), JobExecutionError>>
    + Send
    + Sync;

/// Per-invocation context handed to executors.
#[derive(Clone, Debug)]
pub struct ExecContext {
    pub worker_id: String,
    pub pass_id: Uuid,
}

#[derive(Clone)]
pub struct ExecutorEntry {
    pub executor: Arc<ExecutorFn>,
    pub semaphore: Option<Arc<Semaphore>>,
    pub timeout: Option<Duration>,
}

/// Maps each job type to the callable that performs its work.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<JobType, ExecutorEntry>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, job_type: JobType, executor: F)
    where
        F: for<'a> Fn(&'a Job, &'a ExecContext) -> BoxFuture<'a, Result<(), JobExecutionError>>
            + Send
            + Sync
            + 'static,
    {
        self.register_with_options(job_type, executor, ExecutorOptions::new());
    }

    pub fn register_with_options<F>(
        &mut self,
        job_type: JobType,
        executor: F,
        opts: ExecutorOptions,
    ) where
        F: for<'a> Fn(&'a Job, &'a ExecContext) -> BoxFuture<'a, Result<(), JobExecutionError>>
            + Send
            + Sync
            + 'static,
    {
        let semaphore = opts
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        self.executors.insert(
            job_type,
            ExecutorEntry {
                executor: Arc::new(executor),
                semaphore,
                timeout: opts.timeout,
            },
        );
    }

    pub fn executor_for(&self, job_type: JobType) -> Option<ExecutorEntry> {
        self.executors.get(&job_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.executors.keys().copied().collect();
        types.sort();
        types
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExecutorOptions {
    max_concurrency: Option<usize>,
    timeout: Option<Duration>,
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }
}

impl ExecutorEntry {
    pub async fn run(&self, job: &Job, ctx: &ExecContext) -> Result<(), JobExecutionError> {
        let _permit = match &self.semaphore {
            Some(sem) => Some(sem.clone().acquire_owned().await.map_err(|_| {
                JobExecutionError::new(ErrorKind::DependencyDown, "executor semaphore closed")
            })?),
            None => None,
        };

        let fut = (self.executor)(job, ctx);
        match self.timeout {
            Some(dur) => match timeout(dur, fut).await {
                Ok(inner) => inner,
                Err(_) => Err(JobExecutionError::new(
                    ErrorKind::Timeout,
                    format!("executor timeout after {}ms", dur.as_millis()),
                )),
            },
            None => fut.await,
        }
    }
}

/// Decodes a job payload, mapping schema mismatches to `BAD_PAYLOAD`.
pub fn parse_payload<T: DeserializeOwned>(job: &Job) -> Result<T, JobExecutionError> {
    serde_json::from_value(job.payload_json.clone())
        .map_err(|e| JobExecutionError::new(ErrorKind::BadPayload, e.to_string()))
}

pub fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
