use std::fmt;

/// Width of a correlation id on the wire.
pub const SEQ_LEN: usize = 32;

/// Opaque 32-byte token linking a request to its reply.
///
/// Generated ids are 32 lowercase hex characters (a v4 UUID without
/// hyphens). Ids received from the wire are kept as raw bytes and are not
/// assumed to be hex or even UTF-8.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId([u8; SEQ_LEN]);

impl CorrelationId {
    /// A fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEQ_LEN];
        let hex = uuid::Uuid::new_v4().simple().to_string();
        bytes.copy_from_slice(hex.as_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SEQ_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 32-character id. Returns `None` for any other length.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes: [u8; SEQ_LEN] = s.as_bytes().try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEQ_LEN] {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({self})")
    }
}
