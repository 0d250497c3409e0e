//! Cluster run configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClusterError, Result};
use crate::protocol::codec::DEFAULT_MAX_FRAME_LENGTH;
use crate::worker::BackoffConfig;

/// Configuration for one distributed sort run
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Total participants, coordinator included
    pub nodes: usize,
    /// Address every node binds and dials on
    pub cluster_ip: String,
    /// Node `i` uses port `base_port + i + 1`
    pub base_port: u16,
    /// Location of the input items
    pub input: PathBuf,
    /// Deadline for each socket read or write
    pub io_timeout: Duration,
    /// How long the coordinator waits for every sorted chunk
    pub collect_timeout: Duration,
    /// Largest accepted frame in bytes
    pub max_frame_length: usize,
    /// Worker dial retry policy
    pub backoff: BackoffConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: crate::DEFAULT_NODES,
            cluster_ip: "127.0.0.1".into(),
            base_port: 3000,
            input: PathBuf::from("names.txt"),
            io_timeout: Duration::from_secs(30),
            collect_timeout: Duration::from_secs(120),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Number of worker nodes (everyone except the coordinator)
    pub fn worker_count(&self) -> usize {
        self.nodes.saturating_sub(1)
    }

    /// Port assigned to the node at `index`
    pub fn port_for(&self, index: usize) -> Result<u16> {
        u16::try_from(index + 1)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or_else(|| ClusterError::InvalidConfig {
                reason: format!(
                    "port for node {} overflows (base port {})",
                    index, self.base_port
                ),
            })
    }

    /// Reject configurations that cannot produce a run
    pub fn validate(&self) -> Result<()> {
        if self.nodes < 2 {
            return Err(ClusterError::InvalidConfig {
                reason: format!(
                    "at least 2 nodes are required for a coordinator and a worker, got {}",
                    self.nodes
                ),
            });
        }
        if self.cluster_ip.is_empty() {
            return Err(ClusterError::InvalidConfig {
                reason: "cluster address is empty".into(),
            });
        }
        if self.backoff.max_attempts == 0 {
            return Err(ClusterError::InvalidConfig {
                reason: "dial max_attempts must be at least 1".into(),
            });
        }
        let backoff = &self.backoff;
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(ClusterError::InvalidConfig {
                reason: format!(
                    "dial backoff multiplier must be finite and at least 1, got {}",
                    backoff.multiplier
                ),
            });
        }
        if !backoff.jitter.is_finite() || !(0.0..=1.0).contains(&backoff.jitter) {
            return Err(ClusterError::InvalidConfig {
                reason: format!(
                    "dial backoff jitter must be within 0..=1, got {}",
                    backoff.jitter
                ),
            });
        }
        if self.io_timeout.is_zero() {
            return Err(ClusterError::InvalidConfig {
                reason: "io_timeout must be non-zero".into(),
            });
        }
        if self.collect_timeout.is_zero() {
            return Err(ClusterError::InvalidConfig {
                reason: "collect_timeout must be non-zero".into(),
            });
        }
        if self.max_frame_length == 0 {
            return Err(ClusterError::InvalidConfig {
                reason: "max_frame_length must be non-zero".into(),
            });
        }
        self.port_for(self.nodes - 1)?;
        Ok(())
    }
}
