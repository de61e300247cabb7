//! Client-side channel protocol for FISCO BCOS style blockchain nodes.
//!
//! Nodes speak a length-prefixed binary protocol over mutually
//! authenticated TLS. This crate ties the layers together:
//!
//! - [`transport`]: TLS connector, node addresses, credentials
//! - [`frame`]: wire format, AMOP topic framing, stream reassembly
//! - [`client`]: connection pool, request correlation, timeouts, push
//!   subscriptions
//!
//! Most users only need [`ChannelClient`]:
//!
//! ```no_run
//! # async fn demo() -> bcos_channel::client::Result<()> {
//! use bcos_channel::{ChannelClient, ChannelConfig};
//!
//! let config = ChannelConfig::load("conf/config.json")?;
//! let client = ChannelClient::new();
//! let node = config.select_node()?;
//! let reply = client
//!     .query(
//!         node,
//!         &config.authentication,
//!         "getBlockNumber",
//!         serde_json::json!([config.group_id]),
//!         config.timeout(),
//!     )
//!     .await?;
//! println!("{}", reply["result"]);
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use bcos_channel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bcos_channel_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use bcos_channel_client::*;
}

pub use bcos_channel_client::{
    BlockNotifyHandle, ChannelClient, ChannelConfig, ChannelError, ClientConfig, EventLogFilter,
    EventLogPush, EventLogStatus,
};
pub use bcos_channel_frame::MessageType;
pub use bcos_channel_transport::{Credentials, NodeAddr};
