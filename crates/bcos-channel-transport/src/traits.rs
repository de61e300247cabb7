use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::node::{Credentials, NodeAddr};

/// A connected, bidirectional byte stream to a node.
///
/// Blanket-implemented for every `AsyncRead + AsyncWrite` type, so TLS
/// streams and in-memory duplex pipes are interchangeable.
pub trait ChannelStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ChannelStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased stream returned by a [`Connector`].
pub type BoxedStream = Box<dyn ChannelStream>;

/// Opens streams to nodes.
///
/// The connection pool calls this once per endpoint and keeps the result
/// until the stream fails.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, node: &NodeAddr, credentials: &Credentials) -> Result<BoxedStream>;
}
