//! Node registry
//!
//! The descriptor-to-role mapping fixed by the election. Entries keep the
//! order in which candidates passed the election, which is also the order
//! workers are assigned chunks and their results are merged.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClusterError, Result};
use crate::protocol::NodeDescriptor;

/// Role assigned at election time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// The single coordinator
    Master,
    /// A worker
    Slave,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => f.write_str("master"),
            NodeRole::Slave => f.write_str("slave"),
        }
    }
}

/// One registered node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub descriptor: NodeDescriptor,
    pub role: NodeRole,
}

/// Immutable result of an election.
///
/// Descriptor `status` values here are the election-time snapshot. Live
/// status belongs to each connection, not to the registry.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    entries: Vec<RegistryEntry>,
    coordinator: NodeDescriptor,
}

impl NodeRegistry {
    /// Build a registry from election assignments in registration order.
    ///
    /// Fails unless there is exactly one master and every endpoint appears once.
    pub fn from_assignments(assignments: Vec<(NodeDescriptor, NodeRole)>) -> Result<Self> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (descriptor, _) in &assignments {
            *seen.entry(descriptor.endpoint()).or_default() += 1;
        }
        if let Some((endpoint, _)) = seen.iter().find(|(_, &count)| count > 1) {
            return Err(ClusterError::ElectionRace {
                reason: format!("{} was assigned a role more than once", endpoint),
            });
        }

        let masters: Vec<&NodeDescriptor> = assignments
            .iter()
            .filter(|(_, role)| *role == NodeRole::Master)
            .map(|(descriptor, _)| descriptor)
            .collect();
        let coordinator = match masters.as_slice() {
            [single] => (*single).clone(),
            other => {
                return Err(ClusterError::ElectionRace {
                    reason: format!("expected exactly one master, found {}", other.len()),
                })
            }
        };

        let entries = assignments
            .into_iter()
            .map(|(descriptor, role)| RegistryEntry { descriptor, role })
            .collect();

        let registry = Self {
            entries,
            coordinator,
        };
        info!(
            "Registry built: coordinator {}, {} workers",
            registry.coordinator.endpoint(),
            registry.worker_count()
        );
        Ok(registry)
    }

    /// The coordinator's descriptor
    pub fn coordinator(&self) -> &NodeDescriptor {
        &self.coordinator
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Role of the node at the descriptor's endpoint
    pub fn role_of(&self, node: &NodeDescriptor) -> Option<NodeRole> {
        self.entries
            .iter()
            .find(|entry| entry.descriptor.same_node(node))
            .map(|entry| entry.role)
    }

    /// Workers in registration order
    pub fn workers(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.entries
            .iter()
            .filter(|entry| entry.role == NodeRole::Slave)
            .map(|entry| &entry.descriptor)
    }

    /// Position of a worker in registration order
    pub fn worker_index(&self, node: &NodeDescriptor) -> Option<usize> {
        self.workers().position(|worker| worker.same_node(node))
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.workers().count()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no nodes are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Endpoint-keyed role table
    pub fn roles(&self) -> HashMap<String, NodeRole> {
        self.entries
            .iter()
            .map(|entry| (entry.descriptor.endpoint(), entry.role))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(port: u16) -> NodeDescriptor {
        NodeDescriptor::new(1, "127.0.0.1", port)
    }

    #[test]
    fn test_workers_keep_registration_order() {
        let registry = NodeRegistry::from_assignments(vec![
            (node(3003), NodeRole::Slave),
            (node(3001), NodeRole::Master),
            (node(3002), NodeRole::Slave),
        ])
        .unwrap();

        assert_eq!(registry.coordinator().port, 3001);
        let ports: Vec<u16> = registry.workers().map(|w| w.port).collect();
        assert_eq!(ports, vec![3003, 3002]);
        assert_eq!(registry.worker_index(&node(3002)), Some(1));
        assert_eq!(registry.worker_index(&node(3001)), None);
    }

    #[test]
    fn test_identity_is_endpoint_not_id() {
        let registry = NodeRegistry::from_assignments(vec![
            (node(3001), NodeRole::Master),
            (node(3002), NodeRole::Slave),
        ])
        .unwrap();

        let mut other_id = node(3002);
        other_id.id = 99;
        assert_eq!(registry.role_of(&other_id), Some(NodeRole::Slave));
        assert_eq!(registry.roles().len(), 2);
    }

    #[test]
    fn test_two_masters_rejected() {
        let err = NodeRegistry::from_assignments(vec![
            (node(3001), NodeRole::Master),
            (node(3002), NodeRole::Master),
        ])
        .unwrap_err();
        assert!(matches!(err, ClusterError::ElectionRace { .. }));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let err = NodeRegistry::from_assignments(vec![
            (node(3001), NodeRole::Master),
            (node(3001), NodeRole::Slave),
        ])
        .unwrap_err();
        assert!(matches!(err, ClusterError::ElectionRace { .. }));
    }
}
