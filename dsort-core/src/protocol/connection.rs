//! A framed TCP connection with per-operation deadlines

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::trace;

use super::codec::MessageCodec;
use super::message::ClusterMessage;
use crate::error::{ClusterError, Result};

/// One side of a coordinator/worker connection.
///
/// Every send and receive is bounded by `io_timeout` so a stalled peer cannot
/// hold the task forever.
pub struct FramedConnection {
    framed: Framed<TcpStream, MessageCodec>,
    peer: String,
    io_timeout: Duration,
}

impl FramedConnection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream, max_frame_length: usize, io_timeout: Duration) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".into());
        Self {
            framed: Framed::new(stream, MessageCodec::with_max_frame_length(max_frame_length)),
            peer,
            io_timeout,
        }
    }

    /// Dial `endpoint` once, bounded by `connect_timeout`
    pub async fn connect(
        endpoint: &str,
        connect_timeout: Duration,
        max_frame_length: usize,
        io_timeout: Duration,
    ) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| ClusterError::Timeout {
                operation: "connect".into(),
                endpoint: endpoint.to_string(),
            })?
            .map_err(|e| ClusterError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, max_frame_length, io_timeout))
    }

    /// Remote address, for logging and error reports
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one message
    pub async fn send(&mut self, message: ClusterMessage) -> Result<()> {
        trace!("Sending {} items to {}", message.payload.len(), self.peer);
        timeout(self.io_timeout, self.framed.send(message))
            .await
            .map_err(|_| ClusterError::Timeout {
                operation: "send".into(),
                endpoint: self.peer.clone(),
            })?
    }

    /// Receive one message; `None` means the peer closed cleanly
    pub async fn recv(&mut self) -> Result<Option<ClusterMessage>> {
        let next = timeout(self.io_timeout, self.framed.next())
            .await
            .map_err(|_| ClusterError::Timeout {
                operation: "receive".into(),
                endpoint: self.peer.clone(),
            })?;
        next.transpose()
    }

    /// Flush and shut down the write half
    pub async fn close(mut self) -> Result<()> {
        timeout(self.io_timeout, self.framed.close())
            .await
            .map_err(|_| ClusterError::Timeout {
                operation: "close".into(),
                endpoint: self.peer.clone(),
            })?
    }
}
