//! Plaintext credentials.

use async_trait::async_trait;

use super::{
    AuthInfo, BoxedConn, CredentialsError, Handshake, HandshakeError, ProtocolInfo,
    SecurityLevel, TransportCredentials,
};

/// Protocol name reported for plaintext connections.
pub const PROTOCOL: &str = "insecure";

/// Credentials that leave the connection untouched.
///
/// Used by clients that have not migrated to TLS yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureCredentials;

impl InsecureCredentials {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportCredentials for InsecureCredentials {
    async fn client_handshake(
        &self,
        _authority: &str,
        conn: BoxedConn,
    ) -> Result<Handshake, HandshakeError> {
        Ok(Handshake {
            conn,
            auth_info: AuthInfo::Plaintext,
        })
    }

    async fn server_handshake(&self, conn: BoxedConn) -> Result<Handshake, HandshakeError> {
        Ok(Handshake {
            conn,
            auth_info: AuthInfo::Plaintext,
        })
    }

    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            security_protocol: PROTOCOL,
            security_version: "",
            server_name: None,
            security_level: SecurityLevel::NoSecurity,
        }
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials> {
        Box::new(*self)
    }

    fn override_server_name(&mut self, _name: &str) -> Result<(), CredentialsError> {
        Ok(())
    }
}
