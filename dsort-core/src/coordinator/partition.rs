//! Deterministic input partitioning
//!
//! Splits the input into contiguous, near-equal chunks and pre-sorts each one.

use tracing::debug;

use crate::error::{ClusterError, Result};

/// Contiguous, locally sorted slices of one input, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<T> {
    chunks: Vec<Vec<T>>,
    chunk_size: usize,
    worker_count: usize,
}

impl<T> Partition<T> {
    /// Produced chunks, left to right
    pub fn chunks(&self) -> &[Vec<T>] {
        &self.chunks
    }

    /// Window size used to cut the input
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of workers this partition was planned for
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Total number of items across all chunks
    pub fn total_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Hand out one chunk per worker in order.
    ///
    /// Rounding the chunk size up can produce fewer chunks than workers; the
    /// trailing workers then receive an empty chunk.
    pub fn into_assignments(self) -> Vec<Vec<T>> {
        let mut assignments = self.chunks;
        assignments.resize_with(self.worker_count.max(assignments.len()), Vec::new);
        assignments
    }
}

/// Plans the split of an input across workers
#[derive(Debug, Clone, Copy)]
pub struct PartitionPlanner {
    worker_count: usize,
}

impl PartitionPlanner {
    /// Create a planner; fails when there are no workers
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(ClusterError::InvalidPartition {
                reason: "worker count must be at least 1".into(),
            });
        }
        Ok(Self { worker_count })
    }

    /// `ceil(len / worker_count)`
    pub fn chunk_size(&self, len: usize) -> usize {
        len.div_ceil(self.worker_count)
    }

    /// Cut `items` into windows of `chunk_size` and sort each window
    pub fn partition<T: Ord>(&self, items: Vec<T>) -> Partition<T> {
        let chunk_size = self.chunk_size(items.len());
        let mut chunks = Vec::with_capacity(self.worker_count.min(items.len()));

        if chunk_size > 0 {
            let mut rest = items.into_iter().peekable();
            while rest.peek().is_some() {
                let mut window: Vec<T> = rest.by_ref().take(chunk_size).collect();
                window.sort();
                chunks.push(window);
            }
        }

        debug!(
            "Partitioned input into {} chunks of up to {} items for {} workers",
            chunks.len(),
            chunk_size,
            self.worker_count
        );

        Partition {
            chunks,
            chunk_size,
            worker_count: self.worker_count,
        }
    }
}

/// Partition `items` for `worker_count` workers
pub fn partition<T: Ord>(items: Vec<T>, worker_count: usize) -> Result<Vec<Vec<T>>> {
    let planner = PartitionPlanner::new(worker_count)?;
    Ok(planner.partition(items).chunks)
}
