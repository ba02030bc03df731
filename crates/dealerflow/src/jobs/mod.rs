pub mod error_codes;
pub mod memory;
pub mod model;
pub mod registry;
pub mod repo;
pub mod retry;
pub mod runner;
pub mod store;

pub use error_codes::ErrorKind;
pub use memory::InMemoryJobStore;
pub use model::{Job, JobStatus, JobType, NewJob};
pub use registry::{ExecContext, ExecutorOptions, ExecutorRegistry};
pub use repo::JobsRepo;
pub use runner::{JobOutcome, JobRunner};
pub use store::{JobStore, StatusUpdate};
