//! Wire protocol between coordinator and workers
//!
//! Node descriptors, the request/response envelope, its framed codec and the
//! deadline-bounded connection both sides talk through.

pub mod codec;
pub mod connection;
pub mod message;

pub use codec::MessageCodec;
pub use connection::FramedConnection;
pub use message::{ClusterMessage, NodeDescriptor, NodeStatus};
