/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is smaller than the fixed header.
    #[error("frame length {0} is shorter than the 42-byte header")]
    LengthTooShort(u32),

    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame buffer does not match its own length prefix.
    #[error("frame declares {declared} bytes but {actual} were supplied")]
    LengthMismatch { declared: usize, actual: usize },

    /// An AMOP topic does not fit in the one-byte length field.
    #[error("AMOP topic too long ({0} bytes, max 254)")]
    TopicTooLong(usize),

    /// An AMOP payload has an impossible topic length byte.
    #[error("malformed AMOP payload: {0}")]
    MalformedAmop(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
