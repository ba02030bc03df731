pub mod cycles;
pub mod dependency;
pub mod precedence;

pub use dependency::{build_graph, BlockReason, DependencyGraph, DependencyNode, NodeId, Prerequisite};
pub use precedence::{PrecedenceEntry, PrecedenceTable};
