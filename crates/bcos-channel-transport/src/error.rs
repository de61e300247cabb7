use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while establishing a channel connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to read a credential file.
    #[error("failed to read {path}: {source}")]
    ReadCredential {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A certificate file did not contain a usable certificate.
    #[error("invalid certificate in {path}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    /// The private key file did not contain a usable key.
    #[error("invalid private key in {path}: {reason}")]
    PrivateKey { path: PathBuf, reason: String },

    /// rustls rejected the assembled client configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Failed to connect to the node.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The TCP connect or TLS handshake did not finish in time.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The node address could not be parsed.
    #[error("invalid node address '{0}' (expected ip:port)")]
    InvalidAddress(String),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
