//! Sorted-chunk collection
//!
//! Tracks which workers have delivered their sorted chunk and refuses to hand
//! out a result set until every expected chunk is present.

use tracing::{debug, warn};

use crate::error::{ClusterError, Result};
use crate::protocol::NodeDescriptor;

#[derive(Debug)]
enum Slot {
    Pending,
    Received(Vec<String>),
    Failed(String),
}

/// Per-worker result slots, indexed by registration order
#[derive(Debug)]
pub struct ResultCollector {
    endpoints: Vec<String>,
    slots: Vec<Slot>,
}

impl ResultCollector {
    /// Expect one chunk from each worker
    pub fn new<'a>(workers: impl IntoIterator<Item = &'a NodeDescriptor>) -> Self {
        let endpoints: Vec<String> = workers.into_iter().map(NodeDescriptor::endpoint).collect();
        let slots = endpoints.iter().map(|_| Slot::Pending).collect();
        Self { endpoints, slots }
    }

    /// Number of chunks expected
    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    /// Number of chunks received so far
    pub fn received(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Received(_)))
            .count()
    }

    /// Whether every worker has either delivered or failed
    pub fn is_resolved(&self) -> bool {
        self.slots.iter().all(|slot| !matches!(slot, Slot::Pending))
    }

    /// Store the sorted chunk of the worker at `index`
    pub fn record(&mut self, index: usize, chunk: Vec<String>) -> Result<()> {
        let endpoint = self.endpoint(index)?;
        if !matches!(self.slots[index], Slot::Pending) {
            return Err(ClusterError::ProtocolSequence {
                endpoint,
                state: "collecting results".into(),
                reason: "worker already resolved".into(),
            });
        }
        debug!("Recorded {} sorted items from {}", chunk.len(), endpoint);
        self.slots[index] = Slot::Received(chunk);
        Ok(())
    }

    /// Mark the worker at `index` as failed; a delivered chunk is kept
    pub fn fail(&mut self, index: usize, reason: impl Into<String>) -> Result<()> {
        let endpoint = self.endpoint(index)?;
        let reason = reason.into();
        if matches!(self.slots[index], Slot::Pending) {
            warn!("Chunk from {} will be missing: {}", endpoint, reason);
            self.slots[index] = Slot::Failed(reason);
        }
        Ok(())
    }

    /// Endpoints of workers without a chunk, in registration order
    pub fn missing(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| !matches!(slot, Slot::Received(_)))
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Endpoint and reason for every worker that failed, in registration order
    pub fn failures(&self) -> Vec<(String, String)> {
        self.endpoints
            .iter()
            .zip(&self.slots)
            .filter_map(|(endpoint, slot)| match slot {
                Slot::Failed(reason) => Some((endpoint.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// All chunks in registration order, or `MissingChunks` if any is absent
    pub fn finish(self) -> Result<Vec<Vec<String>>> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ClusterError::MissingChunks {
                expected: self.expected(),
                received: self.received(),
                missing,
                failures: self.failures(),
            });
        }

        Ok(self
            .slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Received(chunk) => Some(chunk),
                _ => None,
            })
            .collect())
    }

    fn endpoint(&self, index: usize) -> Result<String> {
        self.endpoints
            .get(index)
            .cloned()
            .ok_or_else(|| ClusterError::Internal {
                message: format!("no worker at index {}", index),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers() -> Vec<NodeDescriptor> {
        vec![
            NodeDescriptor::new(1, "127.0.0.1", 3002),
            NodeDescriptor::new(1, "127.0.0.1", 3003),
        ]
    }

    #[test]
    fn test_finish_in_registration_order() {
        let nodes = workers();
        let mut collector = ResultCollector::new(&nodes);
        collector.record(1, vec!["c".into()]).unwrap();
        assert!(!collector.is_resolved());
        collector.record(0, vec!["a".into()]).unwrap();
        assert!(collector.is_resolved());

        let chunks = collector.finish().unwrap();
        assert_eq!(chunks, vec![vec!["a".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn test_missing_chunk_blocks_result() {
        let nodes = workers();
        let mut collector = ResultCollector::new(&nodes);
        collector.record(0, vec!["a".into()]).unwrap();
        collector.fail(1, "disconnected").unwrap();
        assert!(collector.is_resolved());

        match collector.finish() {
            Err(ClusterError::MissingChunks {
                expected,
                received,
                missing,
                failures,
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(received, 1);
                assert_eq!(missing, vec!["127.0.0.1:3003".to_string()]);
                assert_eq!(
                    failures,
                    vec![("127.0.0.1:3003".to_string(), "disconnected".to_string())]
                );
            }
            other => panic!("expected MissingChunks, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_delivery_rejected() {
        let nodes = workers();
        let mut collector = ResultCollector::new(&nodes);
        collector.record(0, vec![]).unwrap();
        assert!(collector.record(0, vec![]).is_err());
    }

    #[test]
    fn test_failure_after_delivery_keeps_chunk() {
        let nodes = workers();
        let mut collector = ResultCollector::new(&nodes);
        collector.record(0, vec!["a".into()]).unwrap();
        collector.fail(0, "late close error").unwrap();
        assert_eq!(collector.received(), 1);
    }
}
