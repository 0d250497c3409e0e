//! Coordinator election
//!
//! Every candidate passes once through a single lock-guarded critical section.
//! The first one in sets the "leader taken" flag and becomes master; everyone
//! after it becomes a slave. This is a check-and-set, not consensus: nothing
//! takes over if the master later fails.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::registry::{NodeRegistry, NodeRole};
use crate::error::{ClusterError, Result};
use crate::protocol::{NodeDescriptor, NodeStatus};

#[derive(Debug, Default)]
struct ElectionState {
    leader_taken: bool,
    coordinator: Option<NodeDescriptor>,
    assignments: Vec<(NodeDescriptor, NodeRole)>,
}

/// Process-scoped election state.
///
/// The flag, the coordinator reference and the assignment list are only
/// touched while holding the one lock, so there is a single writer at a time.
#[derive(Debug, Default)]
pub struct ElectionCoordinator {
    state: Mutex<ElectionState>,
}

impl ElectionCoordinator {
    /// Create an election nobody has entered yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one candidate through the critical section and return its role
    pub fn enter(&self, candidate: NodeDescriptor) -> Result<NodeRole> {
        let mut state = self.state.lock();

        if state
            .assignments
            .iter()
            .any(|(existing, _)| existing.same_node(&candidate))
        {
            return Err(ClusterError::ElectionRace {
                reason: format!("{} entered the election twice", candidate.endpoint()),
            });
        }

        let recorded = candidate.with_status(NodeStatus::Down);
        let role = if state.leader_taken {
            NodeRole::Slave
        } else {
            state.leader_taken = true;
            state.coordinator = Some(recorded.clone());
            NodeRole::Master
        };
        debug!("{} elected as {}", recorded.endpoint(), role);
        state.assignments.push((recorded, role));

        Ok(role)
    }

    /// The coordinator, once someone has won
    pub fn coordinator(&self) -> Option<NodeDescriptor> {
        self.state.lock().coordinator.clone()
    }

    /// Number of candidates that have passed through so far
    pub fn entered(&self) -> usize {
        self.state.lock().assignments.len()
    }

    /// Close the election after `expected` candidates have entered
    pub fn finish(&self, expected: usize) -> Result<NodeRegistry> {
        let state = self.state.lock();
        if state.assignments.len() != expected {
            return Err(ClusterError::ElectionRace {
                reason: format!(
                    "{} of {} candidates were assigned a role",
                    state.assignments.len(),
                    expected
                ),
            });
        }
        NodeRegistry::from_assignments(state.assignments.clone())
    }
}

/// Race all candidates concurrently, wait for every one of them, and return
/// the resulting registry.
pub async fn elect(candidates: Vec<NodeDescriptor>) -> Result<NodeRegistry> {
    let expected = candidates.len();
    let election = Arc::new(ElectionCoordinator::new());
    let mut racers = JoinSet::new();

    for candidate in candidates {
        let election = election.clone();
        racers.spawn(async move {
            let candidate = candidate.with_status(NodeStatus::Electing);
            election.enter(candidate)
        });
    }

    // Join barrier: nobody proceeds until every candidate has a role
    while let Some(joined) = racers.join_next().await {
        joined.map_err(|e| ClusterError::Internal {
            message: format!("election task failed: {}", e),
        })??;
    }

    let registry = election.finish(expected)?;
    info!(
        "Election complete: {} is coordinator among {} nodes",
        registry.coordinator().endpoint(),
        registry.len()
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(count: u16) -> Vec<NodeDescriptor> {
        (0..count)
            .map(|i| NodeDescriptor::new(1, "127.0.0.1", 3001 + i))
            .collect()
    }

    #[test]
    fn test_first_entrant_wins() {
        let election = ElectionCoordinator::new();
        let nodes = candidates(3);

        assert_eq!(election.enter(nodes[1].clone()).unwrap(), NodeRole::Master);
        assert_eq!(election.enter(nodes[0].clone()).unwrap(), NodeRole::Slave);
        assert_eq!(election.enter(nodes[2].clone()).unwrap(), NodeRole::Slave);
        assert_eq!(election.coordinator().unwrap().port, 3002);
        assert_eq!(election.entered(), 3);
    }

    #[test]
    fn test_double_entry_is_race_error() {
        let election = ElectionCoordinator::new();
        let node = NodeDescriptor::new(1, "127.0.0.1", 3001);

        election.enter(node.clone()).unwrap();
        let err = election.enter(node).unwrap_err();
        assert!(matches!(err, ClusterError::ElectionRace { .. }));
    }

    #[test]
    fn test_finish_requires_all_candidates() {
        let election = ElectionCoordinator::new();
        election.enter(NodeDescriptor::new(1, "127.0.0.1", 3001)).unwrap();
        assert!(election.finish(2).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_election_has_one_master() {
        for _ in 0..20 {
            let registry = elect(candidates(8)).await.unwrap();
            assert_eq!(registry.len(), 8);
            assert_eq!(registry.worker_count(), 7);
            assert_eq!(registry.role_of(registry.coordinator()), Some(NodeRole::Master));
        }
    }
}
