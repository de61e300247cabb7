//! TLS transport for the channel protocol.
//!
//! Provides the socket layer that everything else sits on:
//! - [`NodeAddr`] identifies a remote node endpoint (`ip:port`)
//! - [`Credentials`] points at the PEM material for client-certificate auth
//! - [`Connector`] opens a byte stream to a node; [`TlsConnector`] is the
//!   production implementation over TCP + rustls
//!
//! This is the lowest layer of bcos-channel. Framing and request
//! correlation live in the crates built on top of it.

pub mod error;
pub mod node;
pub mod tls;
pub mod traits;

pub use error::{Result, TransportError};
pub use node::{Credentials, NodeAddr};
pub use tls::{TlsConnector, TransportConfig, DEFAULT_CONNECT_TIMEOUT};
pub use traits::{BoxedStream, ChannelStream, Connector};
