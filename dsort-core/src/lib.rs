//! dsort core - coordinator-elected distributed sort
//!
//! This crate provides:
//! - Election of a single coordinator among concurrently starting nodes
//! - Deterministic partitioning of the input into pre-sorted chunks
//! - The coordinator/worker exchange over framed TCP
//! - Merging of the sorted chunks into one result

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod input;
pub mod metrics;
pub mod protocol;
pub mod runtime;
pub mod worker;

pub use cluster::SortCluster;
pub use config::ClusterConfig;
pub use error::{ClusterError, Result};

/// Default number of participants, coordinator included
pub const DEFAULT_NODES: usize = 3;
