//! Client side of the channel protocol.
//!
//! [`ChannelClient`] is the entry point: it keeps one connection per node,
//! correlates replies with requests, enforces per-request timeouts, and
//! delivers block-height and event-log pushes to registered callbacks.

pub mod block_height;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod pending;
pub mod pool;
pub mod subscription;

pub use block_height::BlockHeightCache;
pub use client::ChannelClient;
pub use config::{ChannelConfig, ClientConfig, DEFAULT_TIMEOUT_MS, MAX_GROUP_ID};
pub use dispatcher::Dispatcher;
pub use error::{ChannelError, Result};
pub use event_log::{
    EventLogFilter, EventLogPush, EventLogRegistration, EventLogStatus, LATEST,
};
pub use pending::{Completion, PendingKind, PendingTable};
pub use pool::{Connection, ConnectionPool};
pub use subscription::{
    BlockNotifyCallback, BlockNotifyHandle, BlockNotifyRegistry, EventLogCallback,
    EventLogRegistry,
};
