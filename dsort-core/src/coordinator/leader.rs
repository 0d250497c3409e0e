//! Coordinator server
//!
//! Accepts worker connections, ships each worker its chunk, collects the
//! sorted chunks and merges them once every one has arrived.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::merge::merge_all;
use super::registry::NodeRegistry;
use super::results::ResultCollector;
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::metrics::standard;
use crate::protocol::{ClusterMessage, FramedConnection, NodeDescriptor, NodeStatus};
use crate::runtime::ShutdownSignal;

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Deadline for each socket read or write
    pub io_timeout: Duration,
    /// How long to wait for every sorted chunk
    pub collect_timeout: Duration,
    /// Largest accepted frame in bytes
    pub max_frame_length: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&ClusterConfig::default())
    }
}

impl From<&ClusterConfig> for CoordinatorConfig {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            io_timeout: config.io_timeout,
            collect_timeout: config.collect_timeout,
            max_frame_length: config.max_frame_length,
        }
    }
}

/// Per-connection protocol state, coordinator side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Listener bound, no connection yet
    Listening,
    /// Stream accepted
    Accepted,
    /// Waiting for the worker's ready-signal
    AwaitingWorkerMessage,
    /// Chunk written to the worker
    DispatchSent,
    /// Waiting for the sorted chunk
    AwaitingResult,
    /// Sorted chunk received
    Done,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Listening => "listening",
            ConnectionState::Accepted => "accepted",
            ConnectionState::AwaitingWorkerMessage => "awaiting worker message",
            ConnectionState::DispatchSent => "dispatch sent",
            ConnectionState::AwaitingResult => "awaiting result",
            ConnectionState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a connection handler produced
struct HandlerReport {
    peer: SocketAddr,
    worker: Option<usize>,
    outcome: Result<Vec<String>>,
}

/// State shared read-only by every connection handler
struct DispatchContext {
    registry: Arc<NodeRegistry>,
    assignments: Vec<Vec<String>>,
    coordinator: NodeDescriptor,
    config: CoordinatorConfig,
}

/// Drives one accepted connection through the coordinator state machine
struct ConnectionHandler {
    connection: FramedConnection,
    context: Arc<DispatchContext>,
    state: ConnectionState,
    worker: Option<(usize, NodeDescriptor)>,
    dispatched: usize,
}

impl ConnectionHandler {
    fn new(stream: TcpStream, context: Arc<DispatchContext>) -> Self {
        let connection = FramedConnection::new(
            stream,
            context.config.max_frame_length,
            context.config.io_timeout,
        );
        Self {
            connection,
            context,
            state: ConnectionState::Accepted,
            worker: None,
            dispatched: 0,
        }
    }

    async fn run(mut self) -> (Option<usize>, Result<Vec<String>>) {
        let outcome = self.exchange().await;
        let worker = self.worker.as_ref().map(|(index, _)| *index);
        if outcome.is_ok() {
            if let Err(e) = self.connection.close().await {
                debug!("Closing worker connection failed after result: {}", e);
            }
        }
        (worker, outcome)
    }

    async fn exchange(&mut self) -> Result<Vec<String>> {
        self.state = ConnectionState::AwaitingWorkerMessage;
        let ready = self.expect_message("ready signal").await?;
        self.dispatch(ready).await?;

        self.state = ConnectionState::AwaitingResult;
        let result = self.expect_message("sorted chunk").await?;
        let chunk = self.accept_result(result)?;
        self.state = ConnectionState::Done;
        Ok(chunk)
    }

    async fn expect_message(&mut self, what: &str) -> Result<ClusterMessage> {
        self.connection
            .recv()
            .await?
            .ok_or_else(|| ClusterError::ConnectionFailed {
                endpoint: self.connection.peer().to_string(),
                reason: format!("closed while {} before {}", self.state, what),
            })
    }

    fn sequence_error(&self, reason: impl Into<String>) -> ClusterError {
        ClusterError::ProtocolSequence {
            endpoint: self.connection.peer().to_string(),
            state: self.state.to_string(),
            reason: reason.into(),
        }
    }

    async fn dispatch(&mut self, ready: ClusterMessage) -> Result<()> {
        let index = self
            .context
            .registry
            .worker_index(&ready.source)
            .ok_or_else(|| {
                self.sequence_error(format!("{} is not a registered worker", ready.source.endpoint()))
            })?;
        self.worker = Some((index, ready.source.clone()));

        match ready.source.status {
            NodeStatus::Up => {}
            NodeStatus::Down => {
                return Err(self.sequence_error("result delivered before a chunk was dispatched"))
            }
            other => return Err(self.sequence_error(format!("unexpected status {}", other))),
        }

        let chunk = self
            .context
            .assignments
            .get(index)
            .cloned()
            .unwrap_or_default();
        self.dispatched = chunk.len();

        let me = self.context.coordinator.with_status(NodeStatus::Up);
        self.connection
            .send(ClusterMessage::new(&me, &ready.source, chunk))
            .await?;
        self.state = ConnectionState::DispatchSent;
        standard::CHUNKS_DISPATCHED.inc();

        info!(
            "Dispatched chunk {} ({} items) to {}",
            index,
            self.dispatched,
            ready.source.endpoint()
        );
        Ok(())
    }

    fn accept_result(&self, result: ClusterMessage) -> Result<Vec<String>> {
        let Some((_, worker)) = &self.worker else {
            return Err(self.sequence_error("result without a dispatched chunk"));
        };

        match result.source.status {
            NodeStatus::Down => {}
            NodeStatus::Up => return Err(self.sequence_error("second ready signal after dispatch")),
            other => return Err(self.sequence_error(format!("unexpected status {}", other))),
        }
        if !result.source.same_node(worker) {
            return Err(self.sequence_error(format!(
                "result claims to come from {}, chunk went to {}",
                result.source.endpoint(),
                worker.endpoint()
            )));
        }
        if result.payload.len() != self.dispatched {
            return Err(ClusterError::ChunkLengthMismatch {
                endpoint: worker.endpoint(),
                expected: self.dispatched,
                actual: result.payload.len(),
            });
        }
        if !result.payload.windows(2).all(|pair| pair[0] <= pair[1]) {
            return Err(self.sequence_error("returned chunk is not sorted"));
        }

        Ok(result.payload)
    }
}

/// The elected coordinator, bound and ready to accept workers
pub struct Coordinator {
    listener: TcpListener,
    context: Arc<DispatchContext>,
    shutdown: ShutdownSignal,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Coordinator {
    /// Bind the coordinator's port.
    ///
    /// `assignments[i]` is the chunk for the `i`-th worker in registration
    /// order; workers past the end receive an empty chunk.
    pub async fn bind(
        registry: Arc<NodeRegistry>,
        assignments: Vec<Vec<String>>,
        config: CoordinatorConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let coordinator = registry.coordinator().clone();
        let endpoint = coordinator.endpoint();
        let listener = TcpListener::bind(&endpoint)
            .await
            .map_err(|e| ClusterError::ConnectionFailed {
                endpoint: endpoint.clone(),
                reason: format!("unable to listen: {}", e),
            })?;
        info!(
            "Coordinator {} {} on {}",
            coordinator.id,
            ConnectionState::Listening,
            endpoint
        );

        let shutdown_rx = shutdown.subscribe();
        Ok(Self {
            listener,
            context: Arc::new(DispatchContext {
                registry,
                assignments,
                coordinator,
                config,
            }),
            shutdown,
            shutdown_rx,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve workers until every chunk is back, then merge them in
    /// registration order.
    ///
    /// Returns `MissingChunks` if the collection deadline passes, the run is
    /// aborted, or any worker's exchange fails.
    pub async fn run(mut self) -> Result<Vec<String>> {
        let mut collector = ResultCollector::new(self.context.registry.workers());
        let mut handlers: JoinSet<HandlerReport> = JoinSet::new();
        let deadline = tokio::time::sleep(self.context.config.collect_timeout);
        tokio::pin!(deadline);

        while !collector.is_resolved() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        standard::ACTIVE_CONNECTIONS.inc();
                        let context = self.context.clone();
                        handlers.spawn(async move {
                            let (worker, outcome) = ConnectionHandler::new(stream, context).run().await;
                            HandlerReport { peer, worker, outcome }
                        });
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    Self::collect(&mut collector, joined)?;
                }
                _ = &mut deadline => {
                    warn!(
                        "Collection deadline passed with {}/{} chunks",
                        collector.received(),
                        collector.expected()
                    );
                    handlers.abort_all();
                    while let Some(joined) = handlers.join_next().await {
                        Self::collect(&mut collector, joined)?;
                    }
                    break;
                }
                _ = self.shutdown.triggered(&mut self.shutdown_rx) => {
                    warn!("Run aborted, draining {} open connections", handlers.len());
                    while let Some(joined) = handlers.join_next().await {
                        Self::collect(&mut collector, joined)?;
                    }
                    break;
                }
            }
        }

        let chunks = collector.finish()?;
        let merged = merge_all(chunks);
        info!("All chunks received, merged {} items", merged.len());
        Ok(merged)
    }

    fn collect(
        collector: &mut ResultCollector,
        joined: std::result::Result<HandlerReport, tokio::task::JoinError>,
    ) -> Result<()> {
        standard::ACTIVE_CONNECTIONS.dec();
        let report = match joined {
            Ok(report) => report,
            Err(e) if e.is_cancelled() => return Ok(()),
            Err(e) => {
                error!("Connection handler panicked: {}", e);
                return Ok(());
            }
        };

        match (report.worker, report.outcome) {
            (Some(index), Ok(chunk)) => {
                standard::CHUNKS_RECEIVED.inc();
                if let Err(e) = collector.record(index, chunk) {
                    warn!("Discarding duplicate result from {}: {}", report.peer, e);
                }
            }
            (Some(index), Err(e)) => {
                standard::PROTOCOL_ERRORS.inc();
                error!("Worker connection {} failed: {}", report.peer, e);
                collector.fail(index, e.to_string())?;
            }
            (None, Err(e)) => {
                standard::PROTOCOL_ERRORS.inc();
                error!("Unidentified connection {} failed: {}", report.peer, e);
            }
            (None, Ok(_)) => {
                return Err(ClusterError::Internal {
                    message: format!("connection {} finished without a worker", report.peer),
                })
            }
        }
        Ok(())
    }
}
