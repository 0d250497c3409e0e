//! Runtime support shared by the coordinator and the run orchestrator

pub mod shutdown;

pub use shutdown::ShutdownSignal;
