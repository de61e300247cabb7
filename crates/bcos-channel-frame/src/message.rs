//! Channel message type codes and peer error codes.
//!
//! Type codes are stable across the protocol. `Query` never appears on the
//! wire: it marks a read-only request on the client side and is sent as
//! `ChannelRpcRequest`.

use std::fmt;

/// Message type carried in the 2-byte header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Read-only JSON-RPC request (client-side marker).
    Query = 0x11,
    /// JSON-RPC request or response.
    ChannelRpcRequest = 0x12,
    /// Event-log filter registration and its acknowledgement.
    ClientRegisterEventLog = 0x15,
    /// AMOP topic subscription.
    AmopClientTopics = 0x32,
    /// Transaction receipt notification.
    TransactionNotify = 0x1000,
    /// Block height push.
    BlockNotify = 0x1001,
    /// Event-log push for a registered filter.
    EventLogPush = 0x1002,
}

impl MessageType {
    /// Decode a header type code. Returns `None` for codes this client does not speak.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x11 => Some(Self::Query),
            0x12 => Some(Self::ChannelRpcRequest),
            0x15 => Some(Self::ClientRegisterEventLog),
            0x32 => Some(Self::AmopClientTopics),
            0x1000 => Some(Self::TransactionNotify),
            0x1001 => Some(Self::BlockNotify),
            0x1002 => Some(Self::EventLogPush),
            _ => None,
        }
    }

    /// The numeric code of this type.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// The code written to the wire (`Query` is normalized).
    pub fn wire_code(self) -> u16 {
        match self {
            Self::Query => Self::ChannelRpcRequest.code(),
            other => other.code(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::ChannelRpcRequest => "CHANNEL_RPC_REQUEST",
            Self::ClientRegisterEventLog => "CLIENT_REGISTER_EVENT_LOG",
            Self::AmopClientTopics => "AMOP_CLIENT_TOPICS",
            Self::TransactionNotify => "TRANSACTION_NOTIFY",
            Self::BlockNotify => "BLOCK_NOTIFY",
            Self::EventLogPush => "EVENT_LOG_PUSH",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:x})", self.name(), self.code())
    }
}

/// Result code in the 4-byte header field of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorCode {
    Success,
    NodeUnreachable,
    SdkUnreachable,
    ChannelTimeout,
    Unknown(i32),
}

impl ChannelErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            100 => Self::NodeUnreachable,
            101 => Self::SdkUnreachable,
            102 => Self::ChannelTimeout,
            other => Self::Unknown(other),
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for ChannelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NodeUnreachable => write!(f, "node unreachable"),
            Self::SdkUnreachable => write!(f, "SDK unreachable"),
            Self::ChannelTimeout => write!(f, "channel time out"),
            Self::Unknown(code) => write!(f, "unknown channel error code: {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_sent_as_rpc_request() {
        assert_eq!(MessageType::Query.code(), 0x11);
        assert_eq!(MessageType::Query.wire_code(), 0x12);
        assert_eq!(MessageType::BlockNotify.wire_code(), 0x1001);
    }

    #[test]
    fn unknown_type_code_is_none() {
        assert_eq!(MessageType::from_code(0x13), None);
        assert_eq!(
            MessageType::from_code(0x1002),
            Some(MessageType::EventLogPush)
        );
    }

    #[test]
    fn error_code_messages() {
        assert!(ChannelErrorCode::from_code(0).is_success());
        assert_eq!(
            ChannelErrorCode::from_code(100).to_string(),
            "node unreachable"
        );
        assert_eq!(ChannelErrorCode::from_code(101).to_string(), "SDK unreachable");
        assert_eq!(ChannelErrorCode::from_code(102).to_string(), "channel time out");
        assert_eq!(
            ChannelErrorCode::from_code(-7).to_string(),
            "unknown channel error code: -7"
        );
    }
}
