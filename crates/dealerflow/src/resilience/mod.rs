pub mod circuit;
pub mod policy;

pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitStateKind};
pub use policy::{JobTypePolicy, ResiliencePolicies};
