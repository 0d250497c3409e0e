//! Worker-side logic
//!
//! Worker state machine, dial backoff and coordinator client.

pub mod backoff;
pub mod client;
pub mod state;

pub use backoff::BackoffConfig;
pub use client::{ClientConfig, CoordinatorClient};
pub use state::{WorkerPhase, WorkerState};
