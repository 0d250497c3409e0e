//! Coordinator-side logic
//!
//! Election, node registry, partitioning, merging and the coordinator server.

pub mod election;
pub mod leader;
pub mod merge;
pub mod partition;
pub mod registry;
pub mod results;

pub use election::{elect, ElectionCoordinator};
pub use leader::{ConnectionState, Coordinator, CoordinatorConfig};
pub use merge::{merge, merge_all};
pub use partition::{partition, Partition, PartitionPlanner};
pub use registry::{NodeRegistry, NodeRole, RegistryEntry};
pub use results::ResultCollector;
