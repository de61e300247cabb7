use std::path::Path;
use std::time::Duration;

use bcos_channel_frame::FrameConfig;
use bcos_channel_transport::{Credentials, NodeAddr, TransportConfig};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Largest valid group id.
pub const MAX_GROUP_ID: u32 = 32_767;

/// Tuning knobs for a [`ChannelClient`](crate::ChannelClient).
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Frame size limits applied to every connection.
    pub frame: FrameConfig,
    /// Connect timeout for the default TLS connector.
    pub transport: TransportConfig,
}

/// SDK-style configuration file.
///
/// ```json
/// {
///   "nodes": [{"ip": "127.0.0.1", "port": "20200"}],
///   "authentication": {"key": "sdk.key", "cert": "sdk.crt", "ca": "ca.crt"},
///   "groupID": 1,
///   "timeout": 10000
/// }
/// ```
///
/// Relative credential paths are resolved against the file's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub nodes: Vec<NodeAddr>,
    pub authentication: Credentials,
    #[serde(rename = "groupID")]
    pub group_id: u32,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ChannelConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| {
            ChannelError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_slice(&content).map_err(|e| {
            ChannelError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self {
            authentication: config.authentication.resolve_relative_to(base),
            ..config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ChannelError::Config("`nodes` must not be empty".to_string()));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.ip.is_empty()) {
            return Err(ChannelError::Config(format!("invalid node address {node}")));
        }
        if !(1..=MAX_GROUP_ID).contains(&self.group_id) {
            return Err(ChannelError::Config(format!(
                "`groupID` should be within [1, {MAX_GROUP_ID}], got {}",
                self.group_id
            )));
        }
        if self.timeout == 0 {
            return Err(ChannelError::Config("`timeout` must be positive".to_string()));
        }
        Ok(())
    }

    /// Pick a node uniformly at random.
    pub fn select_node(&self) -> Result<&NodeAddr> {
        self.nodes
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| ChannelError::Config("`nodes` must not be empty".to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
