use std::time::Duration;

use bcos_channel_frame::FrameError;
use bcos_channel_transport::TransportError;

/// Errors surfaced by channel client operations.
///
/// `Clone` so a single connection failure can be delivered to every
/// request that was waiting on that connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// Connection-level failure: unreachable node, disconnect, write failure,
    /// or a non-zero channel result code.
    #[error("network error: {0}")]
    Network(String),

    /// No reply within the caller's window.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed frame, unknown message type, or undecodable payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The node answered with an `error` field.
    #[error("node returned an error: {0}")]
    Application(serde_json::Value),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<TransportError> for ChannelError {
    fn from(err: TransportError) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<FrameError> for ChannelError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(_) | FrameError::ConnectionClosed => Self::Network(err.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid JSON payload: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
