//! Coordinator client for workers
//!
//! Dials the coordinator with bounded retries, then runs one
//! ready → chunk → sorted-result exchange.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::backoff::BackoffConfig;
use super::state::{WorkerPhase, WorkerState};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::metrics::standard;
use crate::protocol::codec::DEFAULT_MAX_FRAME_LENGTH;
use crate::protocol::{ClusterMessage, FramedConnection, NodeDescriptor};

/// Configuration for coordinator client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection timeout per dial attempt
    pub connect_timeout: Duration,
    /// Deadline for each read or write
    pub io_timeout: Duration,
    /// Largest accepted frame in bytes
    pub max_frame_length: usize,
    /// Dial retry policy
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            backoff: BackoffConfig::default(),
        }
    }
}

impl From<&ClusterConfig> for ClientConfig {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            connect_timeout: config.io_timeout,
            io_timeout: config.io_timeout,
            max_frame_length: config.max_frame_length,
            backoff: config.backoff.clone(),
        }
    }
}

/// One worker's connection to the coordinator
pub struct CoordinatorClient {
    config: ClientConfig,
    state: WorkerState,
    coordinator: NodeDescriptor,
    rng: StdRng,
}

impl CoordinatorClient {
    /// Create a client for `node` talking to `coordinator`
    pub fn new(config: ClientConfig, node: NodeDescriptor, coordinator: NodeDescriptor) -> Self {
        Self {
            config,
            state: WorkerState::new(node),
            coordinator,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Use a fixed seed for backoff jitter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Current protocol phase
    pub fn phase(&self) -> WorkerPhase {
        self.state.phase()
    }

    /// Dial the coordinator, retrying with exponential backoff and jitter.
    ///
    /// Gives up with `ConnectionFailed` after `max_attempts` dials.
    pub async fn connect(&mut self) -> Result<FramedConnection> {
        let endpoint = self.coordinator.endpoint();
        let attempts = self.config.backoff.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match FramedConnection::connect(
                &endpoint,
                self.config.connect_timeout,
                self.config.max_frame_length,
                self.config.io_timeout,
            )
            .await
            {
                Ok(connection) => {
                    debug!(
                        "{} connected to coordinator {} on attempt {}",
                        self.state.descriptor().endpoint(),
                        endpoint,
                        attempt + 1
                    );
                    return Ok(connection);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "No coordinator at {} yet, attempt {}/{}: {}",
                        endpoint,
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        standard::DIAL_RETRIES.inc();
                        let delay = self.config.backoff.delay(attempt, &mut self.rng);
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClusterError::ConnectionFailed {
            endpoint,
            reason: format!(
                "gave up after {} attempts: {}",
                attempts,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        })
    }

    /// Run the full worker side of the protocol; returns the number of
    /// items sorted
    pub async fn run(mut self) -> Result<usize> {
        let mut connection = self.connect().await?;
        self.state.advance(WorkerPhase::Connected)?;

        let ready = ClusterMessage::new(self.state.descriptor(), &self.coordinator, Vec::new());
        connection.send(ready).await?;
        self.state.advance(WorkerPhase::SentInitial)?;
        self.state.advance(WorkerPhase::AwaitingChunk)?;

        let dispatch = connection
            .recv()
            .await?
            .ok_or_else(|| ClusterError::ConnectionFailed {
                endpoint: connection.peer().to_string(),
                reason: format!("closed while {}", self.state.phase()),
            })?;
        if !dispatch.dest.same_node(self.state.descriptor()) {
            return Err(ClusterError::ProtocolSequence {
                endpoint: connection.peer().to_string(),
                state: self.state.phase().to_string(),
                reason: format!("chunk addressed to {}", dispatch.dest.endpoint()),
            });
        }

        let sorted = sort_chunk(dispatch.payload).await?;
        self.state.advance(WorkerPhase::Sorted)?;

        let count = sorted.len();
        let result = ClusterMessage::new(self.state.descriptor(), &dispatch.source, sorted);
        connection.send(result).await?;
        self.state.advance(WorkerPhase::ResultSent)?;

        connection.close().await?;
        self.state.advance(WorkerPhase::Closed)?;

        info!(
            "{} returned {} sorted items",
            self.state.descriptor().endpoint(),
            count
        );
        Ok(count)
    }
}

/// Sort a chunk off the async worker threads
async fn sort_chunk(mut chunk: Vec<String>) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        chunk.sort();
        standard::CHUNK_SORT_DURATION.observe(started.elapsed().as_secs_f64());
        chunk
    })
    .await
    .map_err(|e| ClusterError::Internal {
        message: format!("sort task failed: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let config = ClientConfig {
            connect_timeout: Duration::from_millis(200),
            backoff: BackoffConfig {
                max_attempts: 3,
                initial: Duration::from_millis(1),
                max: Duration::from_millis(5),
                multiplier: 2.0,
                jitter: 0.5,
            },
            ..Default::default()
        };
        let mut client = CoordinatorClient::new(
            config,
            NodeDescriptor::new(2, "127.0.0.1", 1),
            NodeDescriptor::new(1, "127.0.0.1", port),
        )
        .with_seed(1);

        let err = client.connect().await.err().unwrap();
        match err {
            ClusterError::ConnectionFailed { reason, .. } => {
                assert!(reason.contains("3 attempts"), "{}", reason)
            }
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        assert_eq!(client.phase(), WorkerPhase::Connecting);
    }

    #[tokio::test]
    async fn test_sort_chunk() {
        let sorted = sort_chunk(vec!["b".into(), "c".into(), "a".into()]).await.unwrap();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }
}
