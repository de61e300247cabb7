//! Event-log filter subscriptions.

use std::fmt;

use bcos_channel_frame::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// Block bound meaning "from the current head onwards".
pub const LATEST: &str = "latest";

/// Status carried in the `result` field of every event-log push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLogStatus {
    Success,
    PushCompleted,
    InvalidParams,
    InvalidRequest,
    GroupNotExist,
    InvalidRange,
    InvalidResponse,
    RequestTimeout,
    OtherError,
    Unknown(i64),
}

impl EventLogStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::PushCompleted,
            -41000 => Self::InvalidParams,
            -41001 => Self::InvalidRequest,
            -41002 => Self::GroupNotExist,
            -41003 => Self::InvalidRange,
            -41004 => Self::InvalidResponse,
            -41005 => Self::RequestTimeout,
            -41006 => Self::OtherError,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::PushCompleted => 1,
            Self::InvalidParams => -41000,
            Self::InvalidRequest => -41001,
            Self::GroupNotExist => -41002,
            Self::InvalidRange => -41003,
            Self::InvalidResponse => -41004,
            Self::RequestTimeout => -41005,
            Self::OtherError => -41006,
            Self::Unknown(code) => code,
        }
    }

    /// Only `Success` keeps a subscription alive.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for EventLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::PushCompleted => "push completed",
            Self::InvalidParams => "invalid params",
            Self::InvalidRequest => "invalid request",
            Self::GroupNotExist => "group does not exist",
            Self::InvalidRange => "invalid range",
            Self::InvalidResponse => "invalid response",
            Self::RequestTimeout => "request timeout",
            Self::OtherError => "other error",
            Self::Unknown(code) => return write!(f, "unknown status {code}"),
        };
        f.write_str(name)
    }
}

/// Registration parameters for an event-log filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogFilter {
    #[serde(rename = "fromBlock")]
    pub from_block: String,
    #[serde(rename = "toBlock")]
    pub to_block: String,
    pub addresses: Vec<String>,
    pub topics: Vec<String>,
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "filterID")]
    pub filter_id: String,
}

impl EventLogFilter {
    /// Filter for new logs in `group_id` from any address, with a fresh id.
    pub fn new(group_id: u32) -> Self {
        Self {
            from_block: LATEST.to_string(),
            to_block: LATEST.to_string(),
            addresses: Vec::new(),
            topics: Vec::new(),
            group_id: group_id.to_string(),
            filter_id: CorrelationId::generate().to_string(),
        }
    }

    pub fn with_range(mut self, from_block: impl Into<String>, to_block: impl Into<String>) -> Self {
        self.from_block = from_block.into();
        self.to_block = to_block.into();
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<String>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Reject filters the node would refuse.
    ///
    /// Bounds are `"latest"` or a positive block number with
    /// `from <= to`; addresses are `0x`-prefixed 20-byte hex; topics are
    /// non-empty.
    pub fn validate(&self) -> Result<()> {
        let from = parse_bound(&self.from_block, "fromBlock")?;
        let to = parse_bound(&self.to_block, "toBlock")?;
        match (from, to) {
            (None, Some(_)) => {
                return Err(ChannelError::Config(
                    "toBlock cannot be a number when fromBlock is latest".to_string(),
                ))
            }
            (Some(from), Some(to)) if from > to => {
                return Err(ChannelError::Config(format!(
                    "fromBlock {from} is after toBlock {to}"
                )))
            }
            _ => {}
        }
        if let Some(bad) = self.addresses.iter().find(|a| !is_address(a)) {
            return Err(ChannelError::Config(format!("invalid address: {bad}")));
        }
        if self.topics.iter().any(String::is_empty) {
            return Err(ChannelError::Config("empty topic in filter".to_string()));
        }
        Ok(())
    }
}

fn parse_bound(bound: &str, field: &str) -> Result<Option<u64>> {
    if bound == LATEST {
        return Ok(None);
    }
    match bound.parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ChannelError::Config(format!(
            "{field} must be \"latest\" or a positive block number, got {bound:?}"
        ))),
    }
}

fn is_address(s: &str) -> bool {
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A push delivered for a registered filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogPush {
    pub filter_id: String,
    pub status: EventLogStatus,
    pub logs: Vec<Value>,
}

#[derive(Deserialize)]
struct RawPush {
    #[serde(rename = "filterID")]
    filter_id: String,
    result: i64,
    #[serde(default)]
    logs: Vec<Value>,
}

impl EventLogPush {
    /// Decode an EVENT_LOG_PUSH payload.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let raw: RawPush = serde_json::from_slice(payload)?;
        Ok(Self {
            filter_id: raw.filter_id,
            status: EventLogStatus::from_code(raw.result),
            logs: raw.logs,
        })
    }
}

/// Outcome of a successful filter registration.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogRegistration {
    /// The node's `result` field (`Value::Null` when absent).
    pub result: Value,
    pub filter_id: String,
}
