//! Node descriptors and the cluster message envelope

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status carried on a node's own descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Created, not yet racing for coordinator
    Initializing,
    /// Inside the election
    Electing,
    /// Not connected, or finished its work
    Down,
    /// Connected and ready for a chunk
    Up,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Initializing => "initializing",
            NodeStatus::Electing => "electing",
            NodeStatus::Down => "down",
            NodeStatus::Up => "up",
        };
        f.write_str(name)
    }
}

/// Identity of one cluster participant.
///
/// `address` + `port` identify a node. `id` is informational only and is
/// not guaranteed to be unique, so lookups go through [`endpoint`](Self::endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: u32,
    pub address: String,
    pub port: u16,
    pub status: NodeStatus,
}

impl NodeDescriptor {
    /// Create a descriptor in the `Initializing` state
    pub fn new(id: u32, address: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            address: address.into(),
            port,
            status: NodeStatus::Initializing,
        }
    }

    /// `address:port`, the identity key of this node
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Same node, regardless of id and status
    pub fn same_node(&self, other: &NodeDescriptor) -> bool {
        self.address == other.address && self.port == other.port
    }

    /// Copy of this descriptor with a different status
    pub fn with_status(&self, status: NodeStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} ({}:{}, {})", self.id, self.address, self.port, self.status)
    }
}

/// A request or response travelling over one connection.
///
/// The payload is the unsorted chunk on the way out and the sorted chunk on
/// the way back. A ready-signal carries an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMessage {
    pub source: NodeDescriptor,
    pub dest: NodeDescriptor,
    pub payload: Vec<String>,
}

impl ClusterMessage {
    /// Build a message from descriptor snapshots
    pub fn new(source: &NodeDescriptor, dest: &NodeDescriptor, payload: Vec<String>) -> Self {
        Self {
            source: source.clone(),
            dest: dest.clone(),
            payload,
        }
    }

    /// Reply to this message with source and destination swapped
    pub fn reply(&self, payload: Vec<String>) -> Self {
        Self {
            source: self.dest.clone(),
            dest: self.source.clone(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_identity_ignores_id_and_status() {
        let a = NodeDescriptor::new(1, "127.0.0.1", 3001);
        let b = NodeDescriptor::new(1, "127.0.0.1", 3002);
        let c = NodeDescriptor::new(7, "127.0.0.1", 3001).with_status(NodeStatus::Up);

        assert!(!a.same_node(&b));
        assert!(a.same_node(&c));
        assert_eq!(a.endpoint(), "127.0.0.1:3001");
    }

    #[test]
    fn test_reply_swaps_descriptors() {
        let worker = NodeDescriptor::new(2, "127.0.0.1", 3002).with_status(NodeStatus::Up);
        let master = NodeDescriptor::new(1, "127.0.0.1", 3001);
        let ready = ClusterMessage::new(&worker, &master, Vec::new());

        let dispatch = ready.reply(vec!["b".into(), "a".into()]);
        assert_eq!(dispatch.source, master);
        assert_eq!(dispatch.dest, worker);
        assert_eq!(dispatch.payload, vec!["b", "a"]);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&NodeStatus::Up).unwrap();
        assert_eq!(json, "\"up\"");
        let status: NodeStatus = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(status, NodeStatus::Down);
    }
}
