use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector as RustlsConnector;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::node::{Credentials, NodeAddr};
use crate::traits::{BoxedStream, Connector};

/// Default timeout for TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for outbound connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Opens client-authenticated TLS connections over TCP.
///
/// The server certificate is not verified: trust is established by the
/// node checking our CA-signed client certificate. Handshake signatures
/// are still checked against the presented certificate.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    config: TransportConfig,
    provider: Arc<CryptoProvider>,
}

impl TlsConnector {
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    /// Build the rustls client config for a credential set.
    pub fn client_config(&self, credentials: &Credentials) -> Result<ClientConfig> {
        let mut chain = load_certificates(&credentials.cert)?;
        // The CA rides along in the presented chain so the node can build
        // a path even when the client cert file holds only the leaf.
        for ca in load_certificates(&credentials.ca)? {
            if !chain.contains(&ca) {
                chain.push(ca);
            }
        }
        let key = load_private_key(&credentials.key)?;

        // secp256k1 is the preferred ECDHE curve on FISCO-style nodes, but
        // rustls does not offer it; the provider's default groups are used.
        debug!(
            groups = ?self.provider.kx_groups.iter().map(|g| g.name()).collect::<Vec<_>>(),
            "building TLS client config"
        );

        ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::TlsConfig(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(self.provider.clone())))
            .with_client_auth_cert(chain, key)
            .map_err(|e| TransportError::TlsConfig(e.to_string()))
    }

    async fn open(&self, node: &NodeAddr, credentials: &Credentials) -> Result<BoxedStream> {
        let tls_config = Arc::new(self.client_config(credentials)?);
        let server_name = ServerName::try_from(node.ip.clone())
            .map_err(|e| TransportError::TlsConfig(format!("invalid server name: {e}")))?;

        let tcp = TcpStream::connect((node.ip.as_str(), node.port))
            .await
            .map_err(|source| TransportError::Connect {
                addr: node.to_string(),
                source,
            })?;
        tcp.set_nodelay(true)?;

        let stream = RustlsConnector::from(tls_config)
            .connect(server_name, tcp)
            .await
            .map_err(|source| TransportError::Connect {
                addr: node.to_string(),
                source,
            })?;
        Ok(Box::new(stream))
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, node: &NodeAddr, credentials: &Credentials) -> Result<BoxedStream> {
        let timeout = self.config.connect_timeout;
        let stream = tokio::time::timeout(timeout, self.open(node, credentials))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                addr: node.to_string(),
                timeout,
            })??;
        info!(node = %node, "TLS channel established");
        Ok(stream)
    }
}

#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| TransportError::ReadCredential {
        path: path.to_path_buf(),
        source,
    })
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let pem = read_pem(path)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Certificate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(TransportError::Certificate {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let pem = read_pem(path)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| TransportError::PrivateKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bcos-tls-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn missing_credential_file_is_reported_with_path() {
        let connector = TlsConnector::new();
        let creds = Credentials::new(
            "/nonexistent/sdk.crt",
            "/nonexistent/sdk.key",
            "/nonexistent/ca.crt",
        );
        let err = connector.client_config(&creds).unwrap_err();
        match err {
            TransportError::ReadCredential { path, .. } => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/sdk.crt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let dir = temp_dir("empty-cert");
        let cert = dir.join("sdk.crt");
        std::fs::write(&cert, b"not a pem file\n").unwrap();

        let creds = Credentials::new(&cert, dir.join("sdk.key"), dir.join("ca.crt"));
        let err = TlsConnector::new().client_config(&creds).unwrap_err();
        assert!(matches!(err, TransportError::Certificate { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn connect_loads_credentials_before_dialing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TlsConnector::new();
        let err = connector
            .connect(
                &NodeAddr::new("127.0.0.1", port),
                &Credentials::new("/nonexistent/a", "/nonexistent/b", "/nonexistent/c"),
            )
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, TransportError::ReadCredential { .. }));
    }

    #[test]
    fn default_connect_timeout() {
        assert_eq!(
            TransportConfig::default().connect_timeout,
            DEFAULT_CONNECT_TIMEOUT
        );
    }
}
