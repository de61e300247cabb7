#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bcos_channel_client::{ChannelClient, ClientConfig};
use bcos_channel_frame::{encode_amop, ChannelCodec, CorrelationId, Frame, MessageType};
use bcos_channel_transport::{BoxedStream, Connector, Credentials, NodeAddr, TransportError};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

pub const WAIT: Duration = Duration::from_secs(5);

/// Hands out in-memory pipes instead of TLS sockets and forwards the
/// node side of each pipe to the test.
pub struct FakeConnector {
    connects: AtomicUsize,
    delay: Duration,
    accepted: mpsc::UnboundedSender<FakeNode>,
}

impl FakeConnector {
    pub fn new(delay: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeNode>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            connects: AtomicUsize::new(0),
            delay,
            accepted: tx,
        });
        (connector, rx)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        node: &NodeAddr,
        _credentials: &Credentials,
    ) -> bcos_channel_transport::Result<BoxedStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.accepted
            .send(FakeNode::new(node.clone(), server))
            .map_err(|_| TransportError::Connect {
                addr: node.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no node"),
            })?;
        Ok(Box::new(client))
    }
}

/// The node end of one fake connection.
pub struct FakeNode {
    pub addr: NodeAddr,
    reader: FramedRead<ReadHalf<DuplexStream>, ChannelCodec>,
    writer: FramedWrite<WriteHalf<DuplexStream>, ChannelCodec>,
}

impl FakeNode {
    fn new(addr: NodeAddr, stream: DuplexStream) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            addr,
            reader: FramedRead::new(read_half, ChannelCodec::new()),
            writer: FramedWrite::new(write_half, ChannelCodec::new()),
        }
    }

    /// Next frame from the client.
    pub async fn recv(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.reader.next())
            .await
            .expect("client should send a frame")
            .expect("stream should stay open")
            .expect("frame should decode")
    }

    pub async fn push(&mut self, frame: Frame) {
        self.writer.send(frame).await.expect("node write should succeed");
    }

    /// Reply to `seq` with a JSON body.
    pub async fn reply_json(&mut self, message_type: MessageType, seq: CorrelationId, body: &Value) {
        let payload = Bytes::from(serde_json::to_vec(body).expect("body should serialize"));
        self.push(Frame::new(message_type.code(), seq, 0, payload)).await;
    }

    pub async fn push_block_notify(&mut self, group_id: u32, height: u64) {
        let topic = format!("_block_notify_{group_id}");
        let payload = encode_amop(&topic, format!("{group_id},{height}").as_bytes())
            .expect("topic should fit");
        self.push(Frame::new(
            MessageType::BlockNotify.code(),
            CorrelationId::generate(),
            0,
            payload,
        ))
        .await;
    }
}

pub fn node_addr() -> NodeAddr {
    NodeAddr::new("127.0.0.1", 20200)
}

pub fn credentials() -> Credentials {
    Credentials::new("sdk.crt", "sdk.key", "ca.crt")
}

pub fn client_with(connector: Arc<FakeConnector>) -> ChannelClient {
    ChannelClient::with_connector(connector, ClientConfig::default())
}

pub async fn accept(nodes: &mut mpsc::UnboundedReceiver<FakeNode>) -> FakeNode {
    tokio::time::timeout(WAIT, nodes.recv())
        .await
        .expect("client should connect")
        .expect("connector should stay alive")
}
