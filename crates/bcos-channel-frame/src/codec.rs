use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::{ChannelErrorCode, MessageType};
use crate::seq::{CorrelationId, SEQ_LEN};

/// Frame header: length (4) + type (2) + seq (32) + result (4) = 42 bytes.
pub const HEADER_SIZE: usize = 4 + 2 + SEQ_LEN + 4;

/// Default maximum total frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// One complete channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw type code. Kept raw so unknown codes reach the dispatcher.
    pub message_type: u16,
    /// Correlation id.
    pub seq: CorrelationId,
    /// Result code set by the peer (0 on requests).
    pub error_code: i32,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with explicit header fields.
    pub fn new(
        message_type: u16,
        seq: CorrelationId,
        error_code: i32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            message_type,
            seq,
            error_code,
            payload: payload.into(),
        }
    }

    /// A new outbound request with a fresh correlation id.
    pub fn request(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self::new(
            message_type.wire_code(),
            CorrelationId::generate(),
            0,
            payload,
        )
    }

    /// The decoded message type, if known.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_code(self.message_type)
    }

    /// The decoded peer result code.
    pub fn channel_error(&self) -> ChannelErrorCode {
        ChannelErrorCode::from_code(self.error_code)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (all integers big-endian):
/// ```text
/// ┌────────────┬──────────┬─────────────┬───────────┬─────────┐
/// │ Length(4B) │ Type(2B) │ Seq (32B)   │ Result(4B)│ Payload │
/// │ incl. hdr  │          │ ASCII token │ signed    │         │
/// └────────────┴──────────┴─────────────┴───────────┴─────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let total = frame.wire_size();
    if total > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(total);
    dst.put_u32(total as u32);
    dst.put_u16(frame.message_type);
    dst.put_slice(frame.seq.as_bytes());
    dst.put_i32(frame.error_code);
    dst.put_slice(&frame.payload);
    Ok(())
}

/// Read the length prefix, if at least four bytes are present.
pub fn peek_length(src: &[u8]) -> Option<u32> {
    let prefix: [u8; 4] = src.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Check a length prefix against the header size and the configured maximum.
pub fn validate_length(length: u32, max_frame_size: usize) -> Result<usize> {
    let length_usize = length as usize;
    if length_usize < HEADER_SIZE {
        return Err(FrameError::LengthTooShort(length));
    }
    if length_usize > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: length_usize,
            max: max_frame_size,
        });
    }
    Ok(length_usize)
}

/// Decode exactly one frame's worth of bytes.
///
/// `raw` must hold the complete frame, starting at the length prefix and
/// ending at the last payload byte.
pub fn parse_frame(mut raw: Bytes) -> Result<Frame> {
    let length = peek_length(&raw).ok_or(FrameError::LengthTooShort(raw.len() as u32))?;
    let length = validate_length(length, usize::MAX)?;
    if raw.len() != length {
        return Err(FrameError::LengthMismatch {
            declared: length,
            actual: raw.len(),
        });
    }

    raw.advance(4);
    let message_type = raw.get_u16();
    let mut seq = [0u8; SEQ_LEN];
    raw.copy_to_slice(&mut seq);
    let error_code = raw.get_i32();

    Ok(Frame {
        message_type,
        seq: CorrelationId::from_bytes(seq),
        error_code,
        payload: raw,
    })
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum total frame size in bytes, header included. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }
}
