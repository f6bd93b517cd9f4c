//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use optional_tls::credentials::{InsecureCredentials, TlsCredentials, TransportCredentials};
use optional_tls::lifecycle::Shutdown;
use optional_tls::net::connection::ConnectionTracker;
use optional_tls::net::Listener;
use optional_tls::rpc::{GreeterClient, HelloReply, RpcError, RpcServer};

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Matching server and client TLS credentials for `localhost`.
pub struct TlsFixture {
    pub server: TlsCredentials,
    pub client: TlsCredentials,
    /// Server and client sides in one value.
    pub both: TlsCredentials,
}

pub fn tls_fixture() -> TlsFixture {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let server = TlsCredentials::server_from_der(vec![cert.clone()], key).unwrap();
    let client = TlsCredentials::client_from_roots([cert])
        .unwrap()
        .with_server_name("localhost")
        .unwrap();

    TlsFixture {
        both: server.clone().with_client_side(client.clone()),
        server,
        client,
    }
}

/// A running RPC server. Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    pub tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server<C>(credentials: C, handshake_timeout: Duration) -> TestServer
where
    C: TransportCredentials + 'static,
{
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64).unwrap();

    let server = RpcServer::new(Arc::new(credentials), handshake_timeout)
        .with_shutdown_grace(Duration::from_millis(100));
    let tracker = server.tracker();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        tracker,
        shutdown,
    }
}

/// Connect with `credentials` and issue one greeting.
pub async fn greet(
    server: &TestServer,
    credentials: &dyn TransportCredentials,
    name: &str,
) -> Result<HelloReply, RpcError> {
    let mut client = GreeterClient::connect(&server.authority(), credentials, CLIENT_TIMEOUT).await?;
    client.say_hello(name).await
}

pub async fn greet_plaintext(server: &TestServer, name: &str) -> Result<HelloReply, RpcError> {
    greet(server, &InsecureCredentials::new(), name).await
}
