//! End-to-end tests: TLS and plaintext clients against one optional-TLS port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use optional_tls::credentials::{CredentialsError, OptionalTlsCredentials};
use optional_tls::policy::PolicySwitch;
use optional_tls::rpc::GreeterClient;

mod common;

use common::{greet, greet_plaintext, start_server, tls_fixture, CLIENT_TIMEOUT};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_plaintext_clients_are_served() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.server).unwrap(), HANDSHAKE_TIMEOUT).await;

    for _ in 0..5 {
        let reply = greet_plaintext(&server, "noxiouz").await.unwrap();
        assert_eq!(reply.message, "Hello noxiouz");
        assert_eq!(reply.transport, "insecure");
    }
}

#[tokio::test]
async fn test_tls_clients_are_served() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.server).unwrap(), HANDSHAKE_TIMEOUT).await;

    for _ in 0..5 {
        let reply = greet(&server, &tls.client, "noxiouz").await.unwrap();
        assert_eq!(reply.message, "Hello noxiouz");
        assert_eq!(reply.transport, "tls");
    }
}

#[tokio::test]
async fn test_client_sees_negotiated_tls() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.server).unwrap(), HANDSHAKE_TIMEOUT).await;

    let client = GreeterClient::connect(&server.authority(), &tls.client, CLIENT_TIMEOUT)
        .await
        .unwrap();
    assert!(client.auth_info().is_secure());
}

#[tokio::test]
async fn test_optional_credentials_dial_over_tls() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.both.clone()).unwrap(), HANDSHAKE_TIMEOUT).await;
    let dialer = OptionalTlsCredentials::new(tls.both).unwrap();

    let mut client = GreeterClient::connect(&server.authority(), &dialer, CLIENT_TIMEOUT)
        .await
        .unwrap();
    assert!(client.auth_info().is_secure());

    let reply = client.say_hello("noxiouz").await.unwrap();
    assert_eq!(reply.transport, "tls");
}

#[test]
fn test_client_only_credentials_cannot_back_a_server() {
    let tls = tls_fixture();
    assert!(matches!(
        OptionalTlsCredentials::new(tls.client),
        Err(CredentialsError::CannotServe { .. })
    ));
}

#[tokio::test]
async fn test_policy_change_applies_to_new_connections() {
    let tls = tls_fixture();
    let policy = PolicySwitch::new(false);
    let creds = OptionalTlsCredentials::with_policy(tls.server, policy.clone()).unwrap();
    let server = start_server(creds, HANDSHAKE_TIMEOUT).await;

    assert!(greet_plaintext(&server, "noxiouz").await.is_ok());

    policy.set_required(true);
    assert!(greet_plaintext(&server, "noxiouz").await.is_err());
    let reply = greet(&server, &tls.client, "noxiouz").await.unwrap();
    assert_eq!(reply.transport, "tls");

    policy.set_required(false);
    let reply = greet_plaintext(&server, "noxiouz").await.unwrap();
    assert_eq!(reply.transport, "insecure");
}

#[tokio::test]
async fn test_established_plaintext_connection_survives_policy_change() {
    let tls = tls_fixture();
    let policy = PolicySwitch::new(false);
    let creds = OptionalTlsCredentials::with_policy(tls.server, policy.clone()).unwrap();
    let server = start_server(creds, HANDSHAKE_TIMEOUT).await;

    let mut client = GreeterClient::connect(
        &server.authority(),
        &optional_tls::InsecureCredentials::new(),
        CLIENT_TIMEOUT,
    )
    .await
    .unwrap();
    client.say_hello("first").await.unwrap();

    policy.set_required(true);
    let reply = client.say_hello("second").await.unwrap();
    assert_eq!(reply.message, "Hello second");
}

#[tokio::test]
async fn test_policy_is_not_consulted_for_tls_clients() {
    let tls = tls_fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let creds = OptionalTlsCredentials::with_policy(tls.server, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    })
    .unwrap();
    let server = start_server(creds, HANDSHAKE_TIMEOUT).await;

    for _ in 0..3 {
        greet(&server, &tls.client, "noxiouz").await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(greet_plaintext(&server, "noxiouz").await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_peer_closing_immediately_does_not_disturb_server() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.server).unwrap(), HANDSHAKE_TIMEOUT).await;

    for _ in 0..3 {
        let stream = TcpStream::connect(server.addr).await.unwrap();
        drop(stream);
    }

    let reply = greet_plaintext(&server, "noxiouz").await.unwrap();
    assert_eq!(reply.message, "Hello noxiouz");
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_handshake_timeout() {
    let tls = tls_fixture();
    let server = start_server(
        OptionalTlsCredentials::new(tls.server).unwrap(),
        Duration::from_millis(200),
    )
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server should close a silent connection");
    assert!(matches!(read, Ok(0) | Err(_)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.tracker.active_count(), 0);
}

#[tokio::test]
async fn test_plaintext_bytes_reach_the_server_intact() {
    let tls = tls_fixture();
    let server = start_server(OptionalTlsCredentials::new(tls.server).unwrap(), HANDSHAKE_TIMEOUT).await;

    // Two requests in one write: the sniffed byte and the pipelined line must
    // both survive.
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(
            b"{\"method\":\"say_hello\",\"params\":{\"name\":\"a\"}}\n\
              {\"method\":\"say_hello\",\"params\":{\"name\":\"b\"}}\n",
        )
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    let lines: Vec<&str> = response.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Hello a"));
    assert!(lines[1].contains("Hello b"));
}
