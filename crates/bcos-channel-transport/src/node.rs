use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransportError;

/// Network address of a channel endpoint.
///
/// This is the connection key: the pool keeps at most one live socket per
/// `(ip, port)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    pub ip: String,
    #[serde(deserialize_with = "port_from_str_or_int")]
    pub port: u16,
}

impl NodeAddr {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
        if ip.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(ip, port))
    }
}

// Node lists in SDK config files carry the port as a string.
fn port_from_str_or_int<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Int(u16),
        Str(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Int(port) => Ok(port),
        Port::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{s}'"))),
    }
}

/// PEM material used to authenticate against a node.
///
/// The node trusts the client because its certificate is signed by the
/// chain CA; the node's own certificate is not verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Client certificate chain (PEM).
    pub cert: PathBuf,
    /// Client private key (PEM, PKCS#8 or SEC1).
    pub key: PathBuf,
    /// Chain CA certificate (PEM).
    pub ca: PathBuf,
}

impl Credentials {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>, ca: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            ca: ca.into(),
        }
    }

    /// Resolve relative paths against `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        for path in [&mut self.cert, &mut self.key, &mut self.ca] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}
