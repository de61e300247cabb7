//! AMOP topic framing inside a frame payload.
//!
//! ```text
//! ┌──────────────────┬───────────────┬─────────┐
//! │ topic len + 1 (1B)│ topic (ASCII) │ body    │
//! └──────────────────┴───────────────┴─────────┘
//! ```
//!
//! The length byte counts itself, so the body starts at offset
//! `payload[0]`. Encoders must write `topic.len() + 1`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Topic prefix for block height notifications.
pub const BLOCK_NOTIFY_TOPIC_PREFIX: &str = "_block_notify_";

/// Longest topic that fits the length byte.
pub const MAX_TOPIC_LEN: usize = u8::MAX as usize - 1;

/// Topic used to subscribe to block notifications for a group.
pub fn block_notify_topic(group_id: u32) -> String {
    format!("{BLOCK_NOTIFY_TOPIC_PREFIX}{group_id}")
}

/// Prefix `body` with the topic header.
pub fn encode_amop(topic: &str, body: &[u8]) -> Result<Bytes> {
    if topic.len() > MAX_TOPIC_LEN {
        return Err(FrameError::TopicTooLong(topic.len()));
    }
    let mut buf = BytesMut::with_capacity(1 + topic.len() + body.len());
    buf.put_u8(topic.len() as u8 + 1);
    buf.put_slice(topic.as_bytes());
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Split a topic-addressed payload into `(topic, body)`.
pub fn decode_amop(payload: &Bytes) -> Result<(Bytes, Bytes)> {
    let Some(&len_byte) = payload.first() else {
        return Err(FrameError::MalformedAmop("empty payload".to_string()));
    };
    let body_start = len_byte as usize;
    if body_start == 0 {
        return Err(FrameError::MalformedAmop(
            "topic length byte is zero".to_string(),
        ));
    }
    if body_start > payload.len() {
        return Err(FrameError::MalformedAmop(format!(
            "topic length {} exceeds payload of {} bytes",
            body_start - 1,
            payload.len()
        )));
    }
    Ok((payload.slice(1..body_start), payload.slice(body_start..)))
}
