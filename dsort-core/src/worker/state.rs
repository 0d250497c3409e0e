//! Worker connection state machine
//!
//! Owns the worker's own descriptor for the duration of one connection. The
//! descriptor's `status` travels to the coordinator inside each message and
//! is never written back to the registry.

use std::fmt;

use tracing::trace;

use crate::error::{ClusterError, Result};
use crate::protocol::{NodeDescriptor, NodeStatus};

/// Protocol phase, worker side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Dialing the coordinator
    Connecting,
    /// Stream established
    Connected,
    /// Ready-signal written
    SentInitial,
    /// Waiting for the chunk
    AwaitingChunk,
    /// Chunk sorted locally
    Sorted,
    /// Sorted chunk written back
    ResultSent,
    /// Connection shut down
    Closed,
}

impl WorkerPhase {
    fn successor(self) -> Option<WorkerPhase> {
        match self {
            WorkerPhase::Connecting => Some(WorkerPhase::Connected),
            WorkerPhase::Connected => Some(WorkerPhase::SentInitial),
            WorkerPhase::SentInitial => Some(WorkerPhase::AwaitingChunk),
            WorkerPhase::AwaitingChunk => Some(WorkerPhase::Sorted),
            WorkerPhase::Sorted => Some(WorkerPhase::ResultSent),
            WorkerPhase::ResultSent => Some(WorkerPhase::Closed),
            WorkerPhase::Closed => None,
        }
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Connecting => "connecting",
            WorkerPhase::Connected => "connected",
            WorkerPhase::SentInitial => "sent initial",
            WorkerPhase::AwaitingChunk => "awaiting chunk",
            WorkerPhase::Sorted => "sorted",
            WorkerPhase::ResultSent => "result sent",
            WorkerPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Local worker state for one run
#[derive(Debug, Clone)]
pub struct WorkerState {
    descriptor: NodeDescriptor,
    phase: WorkerPhase,
}

impl WorkerState {
    /// Start in `Connecting` with the node marked down
    pub fn new(descriptor: NodeDescriptor) -> Self {
        Self {
            descriptor: descriptor.with_status(NodeStatus::Down),
            phase: WorkerPhase::Connecting,
        }
    }

    /// This worker's descriptor as it currently stands
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    /// Current phase
    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Move to the next phase; only the immediate successor is allowed.
    ///
    /// Entering `Connected` marks the node up, entering `Sorted` marks it
    /// down to signal completion.
    pub fn advance(&mut self, next: WorkerPhase) -> Result<()> {
        if self.phase.successor() != Some(next) {
            return Err(ClusterError::ProtocolSequence {
                endpoint: self.descriptor.endpoint(),
                state: self.phase.to_string(),
                reason: format!("cannot move to {}", next),
            });
        }

        match next {
            WorkerPhase::Connected => self.descriptor.status = NodeStatus::Up,
            WorkerPhase::Sorted => self.descriptor.status = NodeStatus::Down,
            _ => {}
        }
        trace!("{} {} -> {}", self.descriptor.endpoint(), self.phase, next);
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_phase() {
        let mut state = WorkerState::new(NodeDescriptor::new(1, "127.0.0.1", 3002));
        assert_eq!(state.descriptor().status, NodeStatus::Down);

        state.advance(WorkerPhase::Connected).unwrap();
        assert_eq!(state.descriptor().status, NodeStatus::Up);

        state.advance(WorkerPhase::SentInitial).unwrap();
        state.advance(WorkerPhase::AwaitingChunk).unwrap();
        state.advance(WorkerPhase::Sorted).unwrap();
        assert_eq!(state.descriptor().status, NodeStatus::Down);

        state.advance(WorkerPhase::ResultSent).unwrap();
        state.advance(WorkerPhase::Closed).unwrap();
        assert_eq!(state.phase(), WorkerPhase::Closed);
    }

    #[test]
    fn test_skipping_a_phase_is_rejected() {
        let mut state = WorkerState::new(NodeDescriptor::new(1, "127.0.0.1", 3002));
        let err = state.advance(WorkerPhase::AwaitingChunk).unwrap_err();
        assert!(matches!(err, ClusterError::ProtocolSequence { .. }));
        assert_eq!(state.phase(), WorkerPhase::Connecting);
    }
}
