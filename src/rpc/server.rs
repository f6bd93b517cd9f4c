//! RPC server: accept loop, per-connection handshake, request dispatch.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener until shutdown
//! - Run the credential's server handshake under a deadline
//! - Serve greeter requests over the resulting stream, one bounded frame at
//!   a time, closing connections that go idle
//! - Drain open connections on shutdown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

use crate::credentials::{AuthInfo, BoxedConn, TransportCredentials};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;
use crate::rpc::message::{encode, HelloReply, RpcRequest, RpcResponse};

/// Default upper bound on one request line, newline excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Default time a connection may sit without sending a complete request.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-connection limits applied after the handshake.
#[derive(Debug, Clone, Copy)]
struct FrameLimits {
    idle_timeout: Duration,
    max_frame_len: usize,
}

/// Greeter RPC server secured by pluggable transport credentials.
pub struct RpcServer {
    credentials: Arc<dyn TransportCredentials>,
    handshake_timeout: Duration,
    shutdown_grace: Duration,
    limits: FrameLimits,
    tracker: ConnectionTracker,
}

impl RpcServer {
    pub fn new(credentials: Arc<dyn TransportCredentials>, handshake_timeout: Duration) -> Self {
        Self {
            credentials,
            handshake_timeout,
            shutdown_grace: Duration::from_secs(5),
            limits: FrameLimits {
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                max_frame_len: DEFAULT_MAX_FRAME_LEN,
            },
            tracker: ConnectionTracker::new(),
        }
    }

    /// Close connections that send no complete request for `idle`.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.limits.idle_timeout = idle;
        self
    }

    /// Refuse request lines longer than `len` bytes.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.limits.max_frame_len = len;
        self
    }

    /// How long `run` waits for open connections after shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Handle on the active connection count.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Serve until a shutdown signal is received.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            protocol = self.credentials.info().security_protocol,
            handshake_timeout = ?self.handshake_timeout,
            idle_timeout = ?self.limits.idle_timeout,
            max_frame_len = self.limits.max_frame_len,
            "RPC server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr, permit)) => {
                            metrics::record_connection();
                            let _ = stream.set_nodelay(true);
                            let guard = self.tracker.track();
                            let credentials = Arc::clone(&self.credentials);
                            let handshake_timeout = self.handshake_timeout;
                            let limits = self.limits;
                            tokio::spawn(async move {
                                handle_connection(credentials, handshake_timeout, limits, Box::new(stream), peer_addr, guard, permit).await;
                            });
                        }
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("RPC server shutting down");
                    break;
                }
            }
        }

        if !self.tracker.drain(self.shutdown_grace).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            );
        }
        tracing::info!("RPC server stopped");
        Ok(())
    }
}

async fn handle_connection(
    credentials: Arc<dyn TransportCredentials>,
    handshake_timeout: Duration,
    limits: FrameLimits,
    conn: BoxedConn,
    peer_addr: std::net::SocketAddr,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let connection_id = guard.id();

    let handshake = match tokio::time::timeout(handshake_timeout, credentials.server_handshake(conn)).await {
        Ok(Ok(handshake)) => handshake,
        Ok(Err(e)) => {
            tracing::warn!(connection_id = %connection_id, peer_addr = %peer_addr, error = %e, "Handshake failed");
            return;
        }
        Err(_) => {
            tracing::warn!(connection_id = %connection_id, peer_addr = %peer_addr, "Handshake timed out");
            return;
        }
    };

    tracing::debug!(
        connection_id = %connection_id,
        peer_addr = %peer_addr,
        transport = handshake.auth_info.auth_type(),
        auth_info = ?handshake.auth_info,
        "Connection established"
    );

    if let Err(e) = serve(handshake.conn, &handshake.auth_info, limits).await {
        tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
    }
}

/// Answer requests on `conn` until the peer closes it.
async fn serve(conn: BoxedConn, auth_info: &AuthInfo, limits: FrameLimits) -> io::Result<()> {
    let (reader, mut writer) = tokio::io::split(conn);
    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();

    loop {
        frame.clear();
        let read = tokio::time::timeout(
            limits.idle_timeout,
            read_frame(&mut reader, &mut frame, limits.max_frame_len),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection idle"))??;

        match read {
            Frame::Eof => break,
            Frame::TooLong => {
                let response = RpcResponse::Error {
                    message: format!("request exceeds {} bytes", limits.max_frame_len),
                };
                let reply = encode(&response).map_err(io::Error::other)?;
                writer.write_all(&reply).await?;
                writer.shutdown().await?;
                return Err(io::Error::new(io::ErrorKind::InvalidData, "request frame too long"));
            }
            Frame::Line => {}
        }

        if frame.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let response = dispatch(&frame, auth_info);
        let reply = encode(&response).map_err(io::Error::other)?;
        writer.write_all(&reply).await?;
        writer.flush().await?;
    }

    writer.shutdown().await
}

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// A complete line, newline stripped. A trailing line cut by EOF counts.
    Line,
    /// The peer closed between requests.
    Eof,
    /// No newline within `max_len` bytes.
    TooLong,
}

/// Read one newline-terminated frame into `buf`, reading at most
/// `max_len + 1` bytes from `reader`.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max_len: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;

    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Frame::Line);
    }
    if buf.len() > max_len {
        return Ok(Frame::TooLong);
    }
    Ok(Frame::Line)
}

fn dispatch(frame: &[u8], auth_info: &AuthInfo) -> RpcResponse {
    match serde_json::from_slice::<RpcRequest>(frame) {
        Ok(RpcRequest::SayHello(request)) => RpcResponse::Hello(HelloReply {
            message: format!("Hello {}", request.name),
            transport: auth_info.auth_type().to_string(),
        }),
        Err(e) => RpcResponse::Error {
            message: format!("invalid request: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn dispatch_greets_with_transport() {
        let reply = dispatch(br#"{"method":"say_hello","params":{"name":"noxiouz"}}"#, &AuthInfo::Plaintext);
        assert_eq!(
            reply,
            RpcResponse::Hello(HelloReply {
                message: "Hello noxiouz".into(),
                transport: "insecure".into(),
            })
        );
    }

    #[test]
    fn dispatch_reports_bad_requests() {
        let reply = dispatch(br#"{"method":"say_goodbye"}"#, &AuthInfo::Plaintext);
        assert!(matches!(reply, RpcResponse::Error { .. }));
    }

    fn limits(idle_timeout: Duration, max_frame_len: usize) -> FrameLimits {
        FrameLimits {
            idle_timeout,
            max_frame_len,
        }
    }

    #[tokio::test]
    async fn frames_are_bounded() {
        let input: &[u8] = b"short\nexactly8\n123456789abc";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        assert_eq!(read_frame(&mut reader, &mut buf, 8).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"short");

        buf.clear();
        assert_eq!(read_frame(&mut reader, &mut buf, 8).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"exactly8");

        buf.clear();
        assert_eq!(read_frame(&mut reader, &mut buf, 8).await.unwrap(), Frame::TooLong);
        assert_eq!(buf.len(), 9);
    }

    #[tokio::test]
    async fn endless_line_is_cut_off() {
        let (mut client, server) = duplex(256);
        let flood = tokio::spawn(async move {
            let _ = client.write_all(b"{").await;
            while client.write_all(&[b'a'; 64]).await.is_ok() {}
            let mut reply = String::new();
            let _ = client.read_to_string(&mut reply).await;
            reply
        });

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            serve(Box::new(server), &AuthInfo::Plaintext, limits(Duration::from_secs(5), 128)),
        )
        .await
        .expect("oversized frame must end the connection");
        assert_eq!(served.unwrap_err().kind(), io::ErrorKind::InvalidData);

        let reply = flood.await.unwrap();
        assert!(reply.contains("128 bytes"));
    }

    #[tokio::test]
    async fn oversized_frame_gets_an_error_reply() {
        let (mut client, server) = duplex(1024);
        client.write_all(&[b'x'; 100]).await.unwrap();

        let served = serve(Box::new(server), &AuthInfo::Plaintext, limits(Duration::from_secs(5), 64)).await;
        assert_eq!(served.unwrap_err().kind(), io::ErrorKind::InvalidData);

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        let response: RpcResponse = serde_json::from_str(reply.trim_end()).unwrap();
        assert!(matches!(response, RpcResponse::Error { message } if message.contains("64 bytes")));
    }

    #[tokio::test]
    async fn idle_connection_is_closed() {
        let (_client, server) = duplex(64);

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            serve(Box::new(server), &AuthInfo::Plaintext, limits(Duration::from_millis(50), 64)),
        )
        .await
        .expect("idle timeout must fire");
        assert_eq!(served.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn requests_are_answered_until_peer_closes() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"{\"method\":\"say_hello\",\"params\":{\"name\":\"a\"}}\n\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        serve(Box::new(server), &AuthInfo::Plaintext, limits(Duration::from_secs(5), 64))
            .await
            .unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply.lines().count(), 1);
        assert!(reply.contains("Hello a"));
    }
}
