//! Transport credentials.
//!
//! # Data Flow
//! ```text
//! Server side:
//!     accepted TcpStream
//!     → TransportCredentials::server_handshake
//!     → Handshake { conn, auth_info } handed to the RPC layer
//!
//! Client side:
//!     dialed TcpStream
//!     → TransportCredentials::client_handshake(authority)
//!     → Handshake { conn, auth_info } used by the RPC client
//! ```
//!
//! # Implementations
//! - `tls.rs`: rustls-backed credentials performing a full TLS handshake
//! - `insecure.rs`: plaintext pass-through
//! - `optional.rs`: accepts both on one port, choosing per connection

use std::fmt;
use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod insecure;
pub mod optional;
pub mod tls;

pub use insecure::InsecureCredentials;
pub use optional::OptionalTlsCredentials;
pub use tls::TlsCredentials;

/// A byte stream a credential can secure.
pub trait Conn: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Conn for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased connection passed between the listener, credentials and RPC layer.
pub type BoxedConn = Box<dyn Conn>;

/// Security level of a connection or credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    NoSecurity,
    IntegrityOnly,
    PrivacyAndIntegrity,
}

/// Parameters negotiated by a TLS handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsInfo {
    pub protocol_version: Option<String>,
    pub cipher_suite: Option<String>,
    /// SNI name (server side) or the name the client verified against.
    pub server_name: Option<String>,
    pub peer_certificates: usize,
}

/// What the handshake established about a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthInfo {
    Plaintext,
    Tls(TlsInfo),
}

impl AuthInfo {
    /// Short protocol name for logs and replies.
    pub fn auth_type(&self) -> &'static str {
        match self {
            AuthInfo::Plaintext => insecure::PROTOCOL,
            AuthInfo::Tls(_) => tls::PROTOCOL,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            AuthInfo::Plaintext => SecurityLevel::NoSecurity,
            AuthInfo::Tls(_) => SecurityLevel::PrivacyAndIntegrity,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, AuthInfo::Tls(_))
    }
}

/// Static description of a credential, available without a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub security_protocol: &'static str,
    pub security_version: &'static str,
    pub server_name: Option<String>,
    pub security_level: SecurityLevel,
}

/// Result of a successful handshake.
pub struct Handshake {
    pub conn: BoxedConn,
    pub auth_info: AuthInfo,
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("auth_info", &self.auth_info)
            .finish_non_exhaustive()
    }
}

/// Errors raised while securing a single connection.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to read connection preface: {0}")]
    Sniff(#[source] io::Error),
    #[error("plaintext connection refused: TLS is required")]
    TlsRequired,
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),
    #[error("invalid server name {name:?}")]
    InvalidServerName { name: String },
    #[error("credentials are not configured for {side} handshakes")]
    Unsupported { side: &'static str },
}

/// Errors raised while building credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("optional TLS must wrap a secure credential, got {protocol:?}")]
    InsecureWrapped { protocol: &'static str },
    #[error("optional TLS must wrap a credential that can serve, {protocol:?} is client-only")]
    CannotServe { protocol: &'static str },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse PEM in {path}")]
    Pem { path: String },
    #[error("no certificates found in {path}")]
    NoCertificates { path: String },
    #[error("no private key found in {path}")]
    MissingPrivateKey { path: String },
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
    #[error("invalid server name {name:?}")]
    InvalidServerName { name: String },
}

/// The capability set an RPC transport requires of a pluggable credential.
///
/// Handshakes take `&self` and may run concurrently on any number of
/// connections. Cancellation and deadlines follow the usual async rule:
/// dropping the returned future abandons the handshake and closes the
/// connection.
#[async_trait]
pub trait TransportCredentials: Send + Sync + fmt::Debug {
    /// Secure an outbound connection to `authority` (`host:port`).
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxedConn,
    ) -> Result<Handshake, HandshakeError>;

    /// Secure an inbound connection.
    async fn server_handshake(&self, conn: BoxedConn) -> Result<Handshake, HandshakeError>;

    fn info(&self) -> ProtocolInfo;

    /// Whether this credential is configured for server handshakes at all.
    fn can_serve(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials>;

    /// Replace the name client handshakes verify the server against.
    fn override_server_name(&mut self, name: &str) -> Result<(), CredentialsError>;
}

impl Clone for Box<dyn TransportCredentials> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_info_reports_levels() {
        assert_eq!(AuthInfo::Plaintext.auth_type(), "insecure");
        assert_eq!(AuthInfo::Plaintext.security_level(), SecurityLevel::NoSecurity);
        assert!(!AuthInfo::Plaintext.is_secure());

        let tls = AuthInfo::Tls(TlsInfo::default());
        assert_eq!(tls.auth_type(), "tls");
        assert_eq!(tls.security_level(), SecurityLevel::PrivacyAndIntegrity);
        assert!(tls.is_secure());
    }

    #[test]
    fn boxed_credentials_clone() {
        let creds: Box<dyn TransportCredentials> = Box::new(InsecureCredentials::new());
        let copy = creds.clone();
        assert_eq!(copy.info(), creds.info());
    }
}
