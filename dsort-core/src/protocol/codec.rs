//! Length-delimited JSON codec for [`ClusterMessage`]
//!
//! Each frame is a 4-byte big-endian length followed by one JSON document.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::message::ClusterMessage;
use crate::error::{ClusterError, Result};

/// Default maximum frame length: 64 MiB
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Serialize a message body (without framing)
pub fn encode_message(message: &ClusterMessage) -> Result<Bytes> {
    serde_json::to_vec(message)
        .map(Bytes::from)
        .map_err(|e| ClusterError::Internal {
            message: format!("failed to encode message: {}", e),
        })
}

/// Deserialize a message body (without framing)
pub fn decode_message(bytes: &[u8]) -> Result<ClusterMessage> {
    serde_json::from_slice(bytes).map_err(|e| ClusterError::ProtocolDecode {
        reason: e.to_string(),
    })
}

/// Wraps [`LengthDelimitedCodec`] with JSON serialization of cluster messages
#[derive(Debug)]
pub struct MessageCodec {
    inner: LengthDelimitedCodec,
}

impl MessageCodec {
    /// Create a codec with the default frame limit
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Create a codec that rejects frames longer than `max_frame_length`
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = ClusterMessage;
    type Error = ClusterError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let frame = self
            .inner
            .decode(src)
            .map_err(|e| ClusterError::ProtocolDecode {
                reason: e.to_string(),
            })?;

        match frame {
            Some(bytes) => decode_message(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ClusterError::ProtocolDecode {
                reason: format!("stream ended inside a frame ({} bytes buffered)", src.len()),
            }),
        }
    }
}

impl Encoder<ClusterMessage> for MessageCodec {
    type Error = ClusterError;

    fn encode(&mut self, item: ClusterMessage, dst: &mut BytesMut) -> Result<()> {
        let body = encode_message(&item)?;
        self.inner
            .encode(body, dst)
            .map_err(|e| ClusterError::Internal {
                message: format!("failed to frame message: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{NodeDescriptor, NodeStatus};
    use bytes::BufMut;

    fn sample() -> ClusterMessage {
        let worker = NodeDescriptor::new(2, "127.0.0.1", 3002).with_status(NodeStatus::Down);
        let master = NodeDescriptor::new(1, "127.0.0.1", 3001).with_status(NodeStatus::Up);
        ClusterMessage::new(&worker, &master, vec!["alpha".into(), "beta".into(), "".into()])
    }

    #[test]
    fn test_encode_then_decode_preserves_all_fields() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, sample());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut codec = MessageCodec::new();
        let mut full = BytesMut::new();
        codec.encode(sample(), &mut full).unwrap();

        let mut partial = full.split_to(full.len() - 3);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn test_truncated_stream_is_decode_error() {
        let mut codec = MessageCodec::new();
        let mut full = BytesMut::new();
        codec.encode(sample(), &mut full).unwrap();

        let mut partial = full.split_to(full.len() - 3);
        let err = codec.decode_eof(&mut partial).unwrap_err();
        assert!(matches!(err, ClusterError::ProtocolDecode { .. }));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let mut codec = MessageCodec::new();
        let body = b"{\"source\": 12}";
        let mut buf = BytesMut::new();
        buf.put_u32(body.len() as u32);
        buf.extend_from_slice(body);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClusterError::ProtocolDecode { .. }));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = MessageCodec::with_max_frame_length(16);
        let mut buf = BytesMut::new();
        buf.put_u32(1024);
        buf.extend_from_slice(&[0u8; 32]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClusterError::ProtocolDecode { .. }));
    }
}
