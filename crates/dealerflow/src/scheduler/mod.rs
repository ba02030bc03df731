pub mod batch;
pub mod summary;

pub use batch::{partition_tenants, BatchScheduler, SchedulerConfig};
pub use summary::{FailureKind, JobFailure, PassSummary};
