use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bcos_channel_frame::{block_notify_topic, encode_amop, Frame, MessageType};
use bcos_channel_transport::{Connector, Credentials, NodeAddr, TlsConnector};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::block_height::BlockHeightCache;
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ChannelError, Result};
use crate::event_log::{EventLogFilter, EventLogPush, EventLogRegistration};
use crate::pending::{Outcome, PendingGuard, PendingKind};
use crate::pool::{Connection, ConnectionPool};
use crate::subscription::BlockNotifyHandle;

/// Async client for the channel protocol.
///
/// Cheap to clone; clones share connections, pending requests and
/// subscriptions. Connections are opened on first use and kept one per
/// node. Dropping the last clone aborts every connection's reader task.
#[derive(Clone)]
pub struct ChannelClient {
    pool: ConnectionPool,
    dispatcher: Arc<Dispatcher>,
    block_heights: BlockHeightCache,
    tracked_groups: Arc<Mutex<HashSet<u32>>>,
}

impl ChannelClient {
    /// Client over TLS with default settings.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let connector = Arc::new(TlsConnector::with_config(config.transport.clone()));
        Self::with_connector(connector, config)
    }

    /// Client over a custom connector.
    pub fn with_connector(connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        Self {
            pool: ConnectionPool::new(connector, Arc::clone(&dispatcher), config.frame),
            dispatcher,
            block_heights: BlockHeightCache::new(),
            tracked_groups: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Send a JSON payload to `node`.
    ///
    /// With a timeout, waits for the reply and returns it. Without one (or
    /// with a zero timeout) the call is fire-and-forget: it returns
    /// `Ok(None)` once the frame is written and any reply is dropped.
    pub async fn send(
        &self,
        node: &NodeAddr,
        credentials: &Credentials,
        data: &Value,
        message_type: MessageType,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>> {
        let payload = Bytes::from(serde_json::to_vec(data)?);
        self.send_payload(node, credentials, message_type, payload, timeout)
            .await
    }

    /// Send a pre-encoded payload (e.g. an AMOP-framed body).
    pub async fn send_payload(
        &self,
        node: &NodeAddr,
        credentials: &Credentials,
        message_type: MessageType,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>> {
        let Some(timeout) = timeout.filter(|t| !t.is_zero()) else {
            let connection = self.pool.get_or_connect(node, credentials).await?;
            self.write(&connection, Frame::request(message_type, payload))
                .await?;
            return Ok(None);
        };

        let deadline = Instant::now() + timeout;
        let connection = tokio::time::timeout_at(deadline, self.pool.get_or_connect(node, credentials))
            .await
            .map_err(|_| ChannelError::Timeout(timeout))??;

        let frame = Frame::request(message_type, payload);
        let seq = frame.seq;
        let pending = &self.dispatcher.pending;
        let rx = pending.register(seq, connection.id(), PendingKind::for_message(message_type));
        let _guard = PendingGuard::new(pending, seq);

        self.write(&connection, frame).await?;
        self.await_reply(seq, rx, deadline, timeout).await.map(Some)
    }

    async fn write(&self, connection: &Connection, frame: Frame) -> Result<()> {
        if let Err(err) = connection.send(frame).await {
            if !connection.is_closed() {
                self.pool.fail_connection(connection, &err);
            }
            return Err(err);
        }
        Ok(())
    }

    async fn await_reply(
        &self,
        seq: bcos_channel_frame::CorrelationId,
        mut rx: oneshot::Receiver<Outcome>,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ChannelError::Network("request abandoned".to_string())),
            Err(_) => {
                if self.dispatcher.pending.remove(&seq) {
                    debug!(%seq, ?timeout, "request timed out");
                    Err(ChannelError::Timeout(timeout))
                } else {
                    // A reply won the race against the timer.
                    rx.try_recv()
                        .unwrap_or_else(|_| Err(ChannelError::Timeout(timeout)))
                }
            }
        }
    }

    /// Send a JSON-RPC 2.0 query and wait for the reply.
    pub async fn query(
        &self,
        node: &NodeAddr,
        credentials: &Credentials,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        self.send(node, credentials, &request, MessageType::Query, Some(timeout))
            .await?
            .ok_or_else(|| ChannelError::Protocol("query completed without a reply".to_string()))
    }

    /// Subscribe `callback` to block height notifications for `group_id`
    /// and ask `node` to publish them.
    ///
    /// Notifications for a group reach every registered callback
    /// regardless of which node they came from.
    pub async fn register_block_notify<F>(
        &self,
        group_id: u32,
        callback: F,
        node: &NodeAddr,
        credentials: &Credentials,
    ) -> Result<BlockNotifyHandle>
    where
        F: Fn(u32, u64) + Send + Sync + 'static,
    {
        let handle = self
            .dispatcher
            .block_notify
            .register(group_id, Arc::new(callback));
        let topics = json!([block_notify_topic(group_id)]);
        if let Err(err) = self
            .send(node, credentials, &topics, MessageType::AmopClientTopics, None)
            .await
        {
            self.dispatcher.block_notify.unregister(handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Remove one block-notify callback. The node keeps publishing; the
    /// notifications are simply no longer delivered to it.
    pub fn unregister_block_notify(&self, handle: BlockNotifyHandle) -> bool {
        self.dispatcher.block_notify.unregister(handle)
    }

    /// Register an event-log filter and its callback.
    ///
    /// The callback is installed before the request goes out so no push
    /// can slip past it. If registration fails the callback is removed.
    pub async fn register_event_log<F>(
        &self,
        filter: EventLogFilter,
        callback: F,
        node: &NodeAddr,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<EventLogRegistration>
    where
        F: Fn(&EventLogPush) + Send + Sync + 'static,
    {
        filter.validate()?;
        let body = serde_json::to_vec(&filter)?;
        let payload = encode_amop("", &body)?;
        let filter_id = filter.filter_id;

        self.dispatcher
            .event_logs
            .register(filter_id.clone(), Arc::new(callback));
        let reply = self
            .send_payload(
                node,
                credentials,
                MessageType::ClientRegisterEventLog,
                payload,
                Some(timeout),
            )
            .await;

        match reply {
            Ok(reply) => Ok(EventLogRegistration {
                result: reply
                    .and_then(|r| r.get("result").cloned())
                    .unwrap_or(Value::Null),
                filter_id,
            }),
            Err(err) => {
                self.dispatcher.event_logs.unregister(&filter_id);
                Err(err)
            }
        }
    }

    /// Drop the callback for `filter_id`. Later pushes for it are ignored.
    pub fn unregister_event_log(&self, filter_id: &str) -> bool {
        self.dispatcher.event_logs.unregister(filter_id)
    }

    /// Keep [`block_height`](Self::block_height) current for `group_id` by
    /// subscribing on every node. A group is tracked at most once.
    ///
    /// Succeeds if at least one node accepted the subscription.
    pub async fn track_block_height(
        &self,
        group_id: u32,
        nodes: &[NodeAddr],
        credentials: &Credentials,
    ) -> Result<()> {
        {
            let mut tracked = self
                .tracked_groups
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !tracked.insert(group_id) {
                return Ok(());
            }
        }

        let mut last_err = None;
        let mut subscribed = 0;
        for node in nodes {
            let cache = self.block_heights.clone();
            let callback = move |group: u32, height: u64| {
                cache.update(group, height);
            };
            match self
                .register_block_notify(group_id, callback, node, credentials)
                .await
            {
                Ok(_) => subscribed += 1,
                Err(err) => {
                    warn!(node = %node, group_id, error = %err, "block height subscription failed");
                    last_err = Some(err);
                }
            }
        }

        if subscribed == 0 {
            self.tracked_groups
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&group_id);
            return Err(last_err.unwrap_or_else(|| {
                ChannelError::Config("no nodes to track block height on".to_string())
            }));
        }
        self.block_heights.track(group_id);
        Ok(())
    }

    /// Highest block height seen for a tracked group.
    pub fn block_height(&self, group_id: u32) -> Option<u64> {
        self.block_heights.get(group_id)
    }

    pub fn block_heights(&self) -> &BlockHeightCache {
        &self.block_heights
    }

    /// Requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.dispatcher.pending.len()
    }

    /// Live pooled connections.
    pub fn connection_count(&self) -> usize {
        self.pool.len()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Close every connection and fail every pending request.
    ///
    /// Subscriptions stay registered; a later send reconnects.
    pub fn shutdown(&self) {
        let err = ChannelError::Network("channel client shut down".to_string());
        self.pool.close_all(&err);
        let failed = self.dispatcher.pending.fail_all(&err);
        debug!(failed, "channel client shut down");
    }
}

impl Default for ChannelClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("connections", &self.connection_count())
            .field("pending", &self.pending_requests())
            .finish()
    }
}
