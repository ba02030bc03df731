pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod graph;
pub mod jobs;
pub mod planner;
pub mod resilience;
pub mod scheduler;
pub mod tenants;

pub use error::{
    CircuitOpenError, ConfigurationError, DependencyCycleError, JobExecutionError, SchedulerError,
};
pub use scheduler::{BatchScheduler, PassSummary};
