//! TLS credentials backed by rustls.
//!
//! # Responsibilities
//! - Load certificate chains, private keys and CA roots from PEM files
//! - Run full server and client TLS handshakes via `tokio-rustls`
//! - Report negotiated parameters as `AuthInfo::Tls`
//!
//! Certificate validation is entirely rustls' business; nothing here
//! inspects certificate contents.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use super::{
    AuthInfo, BoxedConn, CredentialsError, Handshake, HandshakeError, ProtocolInfo,
    SecurityLevel, TlsInfo, TransportCredentials,
};

/// Protocol name reported for TLS connections.
pub const PROTOCOL: &str = "tls";

const SECURITY_VERSION: &str = "1.2";

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// rustls-backed transport credentials.
///
/// A value may carry a server config, a client config, or both; using a side
/// that was not configured fails the handshake with `Unsupported`.
#[derive(Clone)]
pub struct TlsCredentials {
    server: Option<Arc<ServerConfig>>,
    client: Option<Arc<ClientConfig>>,
    server_name: Option<String>,
}

impl TlsCredentials {
    /// Server credentials from a prepared rustls config.
    pub fn server(config: Arc<ServerConfig>) -> Self {
        Self {
            server: Some(config),
            client: None,
            server_name: None,
        }
    }

    /// Client credentials from a prepared rustls config.
    pub fn client(config: Arc<ClientConfig>) -> Self {
        Self {
            server: None,
            client: Some(config),
            server_name: None,
        }
    }

    /// Server credentials presenting `chain`, signed by `key`. No client auth.
    pub fn server_from_der(
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, CredentialsError> {
        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(chain, key)?;
        Ok(Self::server(Arc::new(config)))
    }

    /// Server credentials from a PEM certificate chain and PEM private key.
    pub fn server_from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, CredentialsError> {
        let chain = load_certificates(cert_path)?;
        let key = load_private_key(key_path)?;

        tracing::debug!(
            cert_path = %cert_path.display(),
            certificates = chain.len(),
            "Loaded server certificate chain"
        );

        Self::server_from_der(chain, key)
    }

    /// Client credentials trusting exactly `roots`.
    pub fn client_from_roots<I>(roots: I) -> Result<Self, CredentialsError>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut store = RootCertStore::empty();
        for cert in roots {
            store.add(cert)?;
        }

        let config = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(store)
            .with_no_client_auth();
        Ok(Self::client(Arc::new(config)))
    }

    /// Client credentials trusting the CA certificates in a PEM file.
    pub fn client_from_pem_file(ca_path: &Path) -> Result<Self, CredentialsError> {
        Self::client_from_roots(load_certificates(ca_path)?)
    }

    /// Take the client side (config and server name) from `other`, so one
    /// value can both accept and dial.
    pub fn with_client_side(mut self, other: TlsCredentials) -> Self {
        self.client = other.client;
        self.server_name = other.server_name;
        self
    }

    /// Builder-style variant of [`TransportCredentials::override_server_name`].
    pub fn with_server_name(mut self, name: &str) -> Result<Self, CredentialsError> {
        self.override_server_name(name)?;
        Ok(self)
    }

    fn verified_name(&self, authority: &str) -> Result<(ServerName<'static>, String), HandshakeError> {
        let name = match &self.server_name {
            Some(name) => name.clone(),
            None => host_from_authority(authority).to_string(),
        };
        match ServerName::try_from(name.clone()) {
            Ok(server_name) => Ok((server_name, name)),
            Err(_) => Err(HandshakeError::InvalidServerName { name }),
        }
    }
}

impl std::fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("server", &self.server.is_some())
            .field("client", &self.client.is_some())
            .field("server_name", &self.server_name)
            .finish()
    }
}

#[async_trait]
impl TransportCredentials for TlsCredentials {
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxedConn,
    ) -> Result<Handshake, HandshakeError> {
        let config = self
            .client
            .clone()
            .ok_or(HandshakeError::Unsupported { side: "client" })?;
        let (name, verified) = self.verified_name(authority)?;

        let stream = TlsConnector::from(config)
            .connect(name, conn)
            .await
            .map_err(HandshakeError::Tls)?;

        let (_, session) = stream.get_ref();
        let auth_info = AuthInfo::Tls(TlsInfo {
            protocol_version: session.protocol_version().map(|v| format!("{v:?}")),
            cipher_suite: session
                .negotiated_cipher_suite()
                .map(|s| format!("{:?}", s.suite())),
            server_name: Some(verified),
            peer_certificates: session.peer_certificates().map_or(0, |c| c.len()),
        });

        Ok(Handshake {
            conn: Box::new(stream),
            auth_info,
        })
    }

    async fn server_handshake(&self, conn: BoxedConn) -> Result<Handshake, HandshakeError> {
        let config = self
            .server
            .clone()
            .ok_or(HandshakeError::Unsupported { side: "server" })?;

        let stream = TlsAcceptor::from(config)
            .accept(conn)
            .await
            .map_err(HandshakeError::Tls)?;

        let (_, session) = stream.get_ref();
        let auth_info = AuthInfo::Tls(TlsInfo {
            protocol_version: session.protocol_version().map(|v| format!("{v:?}")),
            cipher_suite: session
                .negotiated_cipher_suite()
                .map(|s| format!("{:?}", s.suite())),
            server_name: session.server_name().map(str::to_string),
            peer_certificates: session.peer_certificates().map_or(0, |c| c.len()),
        });

        Ok(Handshake {
            conn: Box::new(stream),
            auth_info,
        })
    }

    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            security_protocol: PROTOCOL,
            security_version: SECURITY_VERSION,
            server_name: self.server_name.clone(),
            security_level: SecurityLevel::PrivacyAndIntegrity,
        }
    }

    fn can_serve(&self) -> bool {
        self.server.is_some()
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials> {
        Box::new(self.clone())
    }

    fn override_server_name(&mut self, name: &str) -> Result<(), CredentialsError> {
        ServerName::try_from(name.to_string()).map_err(|_| CredentialsError::InvalidServerName {
            name: name.to_string(),
        })?;
        self.server_name = Some(name.to_string());
        Ok(())
    }
}

/// Strip the port and IPv6 brackets from `host:port`.
pub fn host_from_authority(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, CredentialsError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| CredentialsError::Io {
        path: display.clone(),
        source,
    })?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CredentialsError::Pem { path: display.clone() })?;

    if certs.is_empty() {
        return Err(CredentialsError::NoCertificates { path: display });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, CredentialsError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| CredentialsError::Io {
        path: display.clone(),
        source,
    })?;

    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|_| CredentialsError::Pem { path: display.clone() })?
        .ok_or(CredentialsError::MissingPrivateKey { path: display })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_taken_from_authority() {
        assert_eq!(host_from_authority("example.com:443"), "example.com");
        assert_eq!(host_from_authority("localhost"), "localhost");
        assert_eq!(host_from_authority("127.0.0.1:50051"), "127.0.0.1");
        assert_eq!(host_from_authority("[::1]:50051"), "::1");
        assert_eq!(host_from_authority("::1"), "::1");
    }

    #[test]
    fn override_rejects_invalid_names() {
        let mut creds = TlsCredentials::client_from_roots(Vec::new()).unwrap();
        assert!(creds.override_server_name("not a hostname!").is_err());
        assert_eq!(creds.info().server_name, None);

        creds.override_server_name("localhost").unwrap();
        assert_eq!(creds.info().server_name.as_deref(), Some("localhost"));
        assert_eq!(creds.info().security_protocol, "tls");
    }

    #[test]
    fn missing_files_are_reported() {
        let err = TlsCredentials::server_from_pem_files(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialsError::Io { .. }));
    }

    #[test]
    fn serving_needs_a_server_config() {
        let client = TlsCredentials::client_from_roots(Vec::new()).unwrap();
        assert!(!client.can_serve());

        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let key = PrivateKeyDer::Pkcs8(certified.key_pair.serialize_der().into());
        let server = TlsCredentials::server_from_der(vec![certified.cert.der().clone()], key).unwrap();
        assert!(server.can_serve());

        let both = server.with_client_side(client.with_server_name("localhost").unwrap());
        assert!(both.can_serve());
        assert_eq!(both.info().server_name.as_deref(), Some("localhost"));
    }

    #[tokio::test]
    async fn client_only_credentials_refuse_server_handshakes() {
        let creds = TlsCredentials::client_from_roots(Vec::new()).unwrap();
        let (_client, server) = tokio::io::duplex(64);
        let err = creds.server_handshake(Box::new(server)).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Unsupported { side: "server" }));
    }
}
