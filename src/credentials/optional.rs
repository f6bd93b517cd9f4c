//! Optional TLS: one listener, TLS and plaintext clients side by side.
//!
//! # Data Flow
//! ```text
//! server_handshake(conn)
//!     → RewindableConnection::new(conn)
//!     → sniff (one byte)
//!         Secure        → wrapped.server_handshake(rewound conn)
//!         Plaintext     → policy says TLS required? reject : pass through
//!         Indeterminate → HandshakeError::Sniff
//! ```
//!
//! # Design Decisions
//! - The policy is read once per connection, only when the client opened in
//!   plaintext; a TLS client is never affected by it
//! - Errors from the wrapped credential are returned untouched
//! - Client handshakes always go to the wrapped credential; dialers choose
//!   plaintext by using `InsecureCredentials` instead

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    AuthInfo, BoxedConn, CredentialsError, Handshake, HandshakeError, ProtocolInfo,
    SecurityLevel, TransportCredentials,
};
use crate::net::rewind::RewindableConnection;
use crate::net::sniff::{sniff, SniffResult};
use crate::observability::metrics;
use crate::policy::{SharedPolicy, TlsPolicy};

/// Credentials accepting TLS and plaintext clients on the same port.
pub struct OptionalTlsCredentials {
    secure: Box<dyn TransportCredentials>,
    policy: Option<SharedPolicy>,
}

impl OptionalTlsCredentials {
    /// Accept plaintext clients unconditionally.
    pub fn new<C>(secure: C) -> Result<Self, CredentialsError>
    where
        C: TransportCredentials + 'static,
    {
        Self::build(Box::new(secure), None)
    }

    /// Refuse plaintext clients whenever `policy` reports TLS as required.
    pub fn with_policy<C, P>(secure: C, policy: P) -> Result<Self, CredentialsError>
    where
        C: TransportCredentials + 'static,
        P: TlsPolicy + 'static,
    {
        Self::build(Box::new(secure), Some(Arc::new(policy)))
    }

    /// Like [`Self::with_policy`] for callers already holding shared handles.
    pub fn from_parts(
        secure: Box<dyn TransportCredentials>,
        policy: Option<SharedPolicy>,
    ) -> Result<Self, CredentialsError> {
        Self::build(secure, policy)
    }

    fn build(
        secure: Box<dyn TransportCredentials>,
        policy: Option<SharedPolicy>,
    ) -> Result<Self, CredentialsError> {
        let info = secure.info();
        if info.security_level == SecurityLevel::NoSecurity {
            return Err(CredentialsError::InsecureWrapped {
                protocol: info.security_protocol,
            });
        }
        if !secure.can_serve() {
            return Err(CredentialsError::CannotServe {
                protocol: info.security_protocol,
            });
        }
        Ok(Self { secure, policy })
    }

    /// Current verdict of the policy; `false` when none is installed.
    pub fn tls_required(&self) -> bool {
        self.policy.as_ref().is_some_and(|p| p.tls_required())
    }
}

impl fmt::Debug for OptionalTlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalTlsCredentials")
            .field("secure", &self.secure)
            .field("has_policy", &self.policy.is_some())
            .finish()
    }
}

#[async_trait]
impl TransportCredentials for OptionalTlsCredentials {
    async fn client_handshake(
        &self,
        authority: &str,
        conn: BoxedConn,
    ) -> Result<Handshake, HandshakeError> {
        self.secure.client_handshake(authority, conn).await
    }

    async fn server_handshake(&self, conn: BoxedConn) -> Result<Handshake, HandshakeError> {
        let mut conn = RewindableConnection::new(conn);

        match sniff(&mut conn).await {
            SniffResult::Secure => {
                tracing::debug!(path = "tls", "Client opened with a TLS record");
                let result = self.secure.server_handshake(Box::new(conn)).await;
                metrics::record_handshake("tls", result.is_ok());
                result
            }
            SniffResult::Plaintext => {
                if self.tls_required() {
                    tracing::warn!(path = "plaintext", "Refusing plaintext client: TLS is required");
                    metrics::record_handshake("plaintext", false);
                    return Err(HandshakeError::TlsRequired);
                }
                tracing::debug!(path = "plaintext", "Client opened in plaintext");
                metrics::record_handshake("plaintext", true);
                Ok(Handshake {
                    conn: Box::new(conn),
                    auth_info: AuthInfo::Plaintext,
                })
            }
            SniffResult::Indeterminate(e) => {
                tracing::debug!(error = %e, "Connection closed before the preface");
                metrics::record_handshake("indeterminate", false);
                Err(HandshakeError::Sniff(e))
            }
        }
    }

    fn info(&self) -> ProtocolInfo {
        self.secure.info()
    }

    fn can_serve(&self) -> bool {
        self.secure.can_serve()
    }

    fn clone_box(&self) -> Box<dyn TransportCredentials> {
        Box::new(Self {
            secure: self.secure.clone_box(),
            policy: self.policy.clone(),
        })
    }

    fn override_server_name(&mut self, name: &str) -> Result<(), CredentialsError> {
        self.secure.override_server_name(name)
    }
}
