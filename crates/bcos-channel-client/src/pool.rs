//! One live connection per node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bcos_channel_frame::{ChannelCodec, Frame, FrameConfig};
use bcos_channel_transport::{BoxedStream, Connector, Credentials, NodeAddr};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::OnceCell;
use tokio::task::AbortHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{ChannelError, Result};

type FrameSink = FramedWrite<WriteHalf<BoxedStream>, ChannelCodec>;
type FrameSource = FramedRead<ReadHalf<BoxedStream>, ChannelCodec>;
type Slot = Arc<OnceCell<Arc<Connection>>>;

/// A live connection to one node.
///
/// Writes are serialized through an async mutex so frames never
/// interleave. Reads happen on a dedicated task that feeds the
/// [`Dispatcher`].
pub struct Connection {
    id: u64,
    node: NodeAddr,
    writer: tokio::sync::Mutex<FrameSink>,
    closed: AtomicBool,
    reader: Mutex<Option<AbortHandle>>,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node(&self) -> &NodeAddr {
        &self.node
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Write one frame.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(ChannelError::Network(format!(
                "connection to {} is closed",
                self.node
            )));
        }
        let mut writer = self.writer.lock().await;
        writer.send(frame).await.map_err(|e| {
            ChannelError::Network(format!("failed to write to {}: {e}", self.node))
        })
    }

    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    fn abort_reader(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Node address → connection, opened lazily on first use.
///
/// Concurrent first sends to the same node share one connect attempt. A
/// failed connection is retired from the map so the next send dials again.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    frame_config: FrameConfig,
    slots: Mutex<HashMap<NodeAddr, Slot>>,
    next_id: AtomicU64,
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
        frame_config: FrameConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                dispatcher,
                frame_config,
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The live connection for `node`, connecting if there is none.
    pub async fn get_or_connect(
        &self,
        node: &NodeAddr,
        credentials: &Credentials,
    ) -> Result<Arc<Connection>> {
        loop {
            let slot = Arc::clone(self.inner.lock_slots().entry(node.clone()).or_default());
            let connection = slot
                .get_or_try_init(|| self.inner.open(node, credentials))
                .await?;
            if !connection.is_closed() {
                return Ok(Arc::clone(connection));
            }
            // Closed but not yet retired by its reader task.
            self.inner.retire(connection);
        }
    }

    /// Close a connection and fail everything waiting on it.
    pub fn fail_connection(&self, connection: &Connection, err: &ChannelError) {
        self.inner.fail_connection(connection, err);
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.inner
            .lock_slots()
            .values()
            .filter(|slot| slot.get().is_some_and(|c| !c.is_closed()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every connection.
    pub fn close_all(&self, err: &ChannelError) {
        let slots: Vec<Slot> = self.inner.lock_slots().drain().map(|(_, s)| s).collect();
        for slot in slots {
            if let Some(connection) = slot.get() {
                self.inner.fail_connection(connection, err);
            }
        }
    }
}

impl PoolInner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<NodeAddr, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn open(
        self: &Arc<Self>,
        node: &NodeAddr,
        credentials: &Credentials,
    ) -> Result<Arc<Connection>> {
        let stream = self.connector.connect(node, credentials).await?;
        let (read_half, write_half) = tokio::io::split(stream);

        let connection = Arc::new(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            node: node.clone(),
            writer: tokio::sync::Mutex::new(FramedWrite::new(
                write_half,
                ChannelCodec::with_config(self.frame_config.clone()),
            )),
            closed: AtomicBool::new(false),
            reader: Mutex::new(None),
        });

        let frames = FramedRead::new(
            read_half,
            ChannelCodec::with_config(self.frame_config.clone()),
        );
        let task = tokio::spawn(read_loop(
            Arc::downgrade(self),
            Arc::clone(&self.dispatcher),
            Arc::clone(&connection),
            frames,
        ));
        *connection
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task.abort_handle());

        info!(node = %node, connection_id = connection.id, "channel connection established");
        Ok(connection)
    }

    fn fail_connection(&self, connection: &Connection, err: &ChannelError) {
        let first = connection.mark_closed();
        self.retire(connection);
        connection.abort_reader();
        let failed = self.dispatcher.pending.fail_connection(connection.id, err);
        if first {
            debug!(
                node = %connection.node,
                connection_id = connection.id,
                failed,
                "channel connection closed"
            );
        }
    }

    /// Drop the map entry if it still points at `connection`.
    fn retire(&self, connection: &Connection) {
        let mut slots = self.lock_slots();
        let current = slots
            .get(&connection.node)
            .and_then(|slot| slot.get())
            .map(|c| c.id);
        if current == Some(connection.id) {
            slots.remove(&connection.node);
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(|e| e.into_inner());
        for slot in slots.values() {
            if let Some(connection) = slot.get() {
                connection.mark_closed();
                connection.abort_reader();
            }
        }
    }
}

async fn read_loop(
    pool: Weak<PoolInner>,
    dispatcher: Arc<Dispatcher>,
    connection: Arc<Connection>,
    mut frames: FrameSource,
) {
    let failure = loop {
        match frames.next().await {
            Some(Ok(frame)) => {
                if let Err(err) = dispatcher.dispatch(frame) {
                    break err;
                }
            }
            Some(Err(err)) => break ChannelError::from(err),
            None => break ChannelError::Network("disconnected from remote node".to_string()),
        }
    };

    if !connection.is_closed() {
        warn!(node = %connection.node, error = %failure, "channel connection failed");
    }
    connection.mark_closed();
    if let Some(pool) = pool.upgrade() {
        pool.retire(&connection);
    }
    dispatcher.pending.fail_connection(connection.id, &failure);
    // Release the abort handle; this task is finishing on its own.
    connection
        .reader
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
}
