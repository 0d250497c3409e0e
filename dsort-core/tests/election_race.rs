//! Concurrent election outcomes
//!
//! Which node wins varies between runs; the role counts never do.

use std::collections::HashSet;

use dsort_core::coordinator::{elect, NodeRole};
use dsort_core::protocol::NodeDescriptor;

fn candidates(count: u16) -> Vec<NodeDescriptor> {
    // Every node shares id 1; identity is the endpoint
    (0..count)
        .map(|i| NodeDescriptor::new(1, "127.0.0.1", 6001 + i))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn exactly_one_master_for_any_cluster_size() {
    for size in 2..=16u16 {
        let registry = elect(candidates(size)).await.unwrap();
        let roles = registry.roles();

        let masters = roles.values().filter(|r| **r == NodeRole::Master).count();
        let slaves = roles.values().filter(|r| **r == NodeRole::Slave).count();
        assert_eq!(masters, 1, "cluster of {}", size);
        assert_eq!(slaves, usize::from(size) - 1, "cluster of {}", size);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn every_candidate_assigned_once() {
    for _ in 0..50 {
        let registry = elect(candidates(6)).await.unwrap();
        let endpoints: HashSet<String> = registry
            .entries()
            .iter()
            .map(|entry| entry.descriptor.endpoint())
            .collect();
        assert_eq!(endpoints.len(), 6);
        assert!(!registry.workers().any(|w| w.same_node(registry.coordinator())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn duplicate_candidate_fails_election() {
    let mut nodes = candidates(3);
    nodes.push(nodes[0].clone());
    assert!(elect(nodes).await.is_err());
}
