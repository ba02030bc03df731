//! Lifecycle notifications for jobs and passes.
//!
//! Delivery is best effort: a failing sink is logged and otherwise ignored.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::jobs::model::JobType;
use crate::jobs::retry::Disposition;
use crate::scheduler::PassSummary;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    PassStarted {
        pass_id: Uuid,
        budget: usize,
    },
    JobStarted {
        job_id: Uuid,
        tenant_id: String,
        job_type: JobType,
        attempt: i32,
    },
    JobCompleted {
        job_id: Uuid,
        tenant_id: String,
        job_type: JobType,
        latency_ms: u64,
    },
    JobFailed {
        job_id: Uuid,
        tenant_id: String,
        job_type: JobType,
        error: String,
        disposition: Disposition,
    },
    JobRejected {
        job_id: Uuid,
        tenant_id: String,
        job_type: JobType,
        retry_after_ms: u64,
    },
    PassCompleted {
        pass_id: Uuid,
        summary: PassSummary,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}

/// Writes every event to the log at debug level.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        let body = serde_json::to_string(event)?;
        tracing::debug!(target: "dealerflow::events", %body, "lifecycle event");
        Ok(())
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("event channel closed"))
    }
}

pub(crate) async fn notify(sink: &dyn EventSink, event: LifecycleEvent) {
    if let Err(e) = sink.emit(&event).await {
        tracing::warn!(error = %e, "lifecycle notification not delivered");
    }
}
