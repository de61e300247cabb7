//! Channel protocol framing.
//!
//! Every message on a channel connection is framed with a 42-byte header:
//! - a 4-byte big-endian total length (header included)
//! - a 2-byte big-endian message type
//! - a 32-byte ASCII correlation id
//! - a 4-byte big-endian signed result code
//!
//! Topic-addressed (AMOP) messages carry a second, one-byte-length topic
//! header inside the payload; see [`amop`].

pub mod amop;
pub mod codec;
pub mod error;
pub mod framed;
pub mod message;
pub mod reassembler;
pub mod seq;

pub use amop::{block_notify_topic, decode_amop, encode_amop, BLOCK_NOTIFY_TOPIC_PREFIX};
pub use codec::{encode_frame, parse_frame, Frame, FrameConfig, DEFAULT_MAX_FRAME, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use framed::ChannelCodec;
pub use message::{ChannelErrorCode, MessageType};
pub use reassembler::FrameReassembler;
pub use seq::{CorrelationId, SEQ_LEN};
