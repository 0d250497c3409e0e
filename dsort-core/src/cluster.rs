//! Whole-run orchestration
//!
//! Plans the partition, elects a coordinator, starts the coordinator and one
//! task per worker, and returns the merged result.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ClusterConfig;
use crate::coordinator::{elect, Coordinator, CoordinatorConfig, PartitionPlanner};
use crate::error::{ClusterError, Result};
use crate::metrics::standard;
use crate::protocol::NodeDescriptor;
use crate::runtime::ShutdownSignal;
use crate::worker::{ClientConfig, CoordinatorClient};

/// A configured cluster, ready to sort
pub struct SortCluster {
    config: ClusterConfig,
    shutdown: ShutdownSignal,
}

impl SortCluster {
    /// Validate the configuration and build the cluster
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Handle that aborts a running sort when triggered
    pub fn abort_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// One candidate per node on consecutive ports after the base port
    pub fn candidates(&self) -> Result<Vec<NodeDescriptor>> {
        (0..self.config.nodes)
            .map(|index| -> Result<NodeDescriptor> {
                let port = self.config.port_for(index)?;
                let id = u32::try_from(index + 1).map_err(|_| ClusterError::InvalidConfig {
                    reason: format!("too many nodes: {}", self.config.nodes),
                })?;
                Ok(NodeDescriptor::new(id, self.config.cluster_ip.clone(), port))
            })
            .collect()
    }

    /// Sort `items` across the cluster
    pub async fn run(&self, items: Vec<String>) -> Result<Vec<String>> {
        if self.shutdown.is_triggered() {
            return Err(ClusterError::Aborted);
        }

        let planner = PartitionPlanner::new(self.config.worker_count())?;
        let plan = planner.partition(items);
        info!(
            "Planned {} items into {} chunks of up to {}",
            plan.total_len(),
            plan.chunks().len(),
            plan.chunk_size()
        );
        let assignments = plan.into_assignments();

        let registry = Arc::new(elect(self.candidates()?).await?);
        standard::NODES_ELECTED.set(registry.len() as i64);

        let coordinator = Coordinator::bind(
            registry.clone(),
            assignments,
            CoordinatorConfig::from(&self.config),
            self.shutdown.clone(),
        )
        .await?;
        let coordinator_task = tokio::spawn(coordinator.run());

        let client_config = ClientConfig::from(&self.config);
        let mut workers = JoinSet::new();
        for worker in registry.workers() {
            let client = CoordinatorClient::new(
                client_config.clone(),
                worker.clone(),
                registry.coordinator().clone(),
            );
            let endpoint = worker.endpoint();
            workers.spawn(async move { (endpoint, client.run().await) });
        }

        let mut failed = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((endpoint, Err(e))) => {
                    error!("Worker {} failed: {}", endpoint, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("Worker task failed: {}", e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            warn!("{} workers failed, aborting collection", failed);
            self.shutdown.shutdown();
        }

        coordinator_task.await.map_err(|e| ClusterError::Internal {
            message: format!("coordinator task failed: {}", e),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_use_consecutive_ports() {
        let cluster = SortCluster::new(ClusterConfig {
            nodes: 3,
            base_port: 5000,
            ..Default::default()
        })
        .unwrap();

        let ports: Vec<u16> = cluster.candidates().unwrap().iter().map(|n| n.port).collect();
        assert_eq!(ports, vec![5001, 5002, 5003]);
    }

    #[test]
    fn test_single_node_rejected_before_network() {
        let result = SortCluster::new(ClusterConfig {
            nodes: 1,
            ..Default::default()
        });
        assert!(matches!(result, Err(ClusterError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_aborted_before_start() {
        let cluster = SortCluster::new(ClusterConfig::default()).unwrap();
        cluster.abort_handle().shutdown();
        let err = cluster.run(vec!["a".into()]).await.unwrap_err();
        assert!(matches!(err, ClusterError::Aborted));
    }
}
