//! Greeter client.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::credentials::{AuthInfo, BoxedConn, TransportCredentials};
use crate::rpc::message::{encode, HelloReply, HelloRequest, RpcRequest, RpcResponse};
use crate::rpc::RpcError;

/// A connected greeter client.
///
/// The caller decides the transport up front by the credentials it dials
/// with: `InsecureCredentials` for plaintext, `TlsCredentials` for TLS.
///
/// A failed exchange leaves the stream out of step with the server, so
/// every later call returns `RpcError::Closed`.
pub struct GreeterClient {
    conn: BufReader<BoxedConn>,
    auth_info: AuthInfo,
    timeout: Duration,
    broken: bool,
}

impl GreeterClient {
    /// Dial `addr` and run the client handshake, both bounded by `timeout`.
    pub async fn connect(
        addr: &str,
        credentials: &dyn TransportCredentials,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let dial = async {
            let stream = TcpStream::connect(addr).await.map_err(RpcError::Connect)?;
            let _ = stream.set_nodelay(true);
            credentials
                .client_handshake(addr, Box::new(stream))
                .await
                .map_err(RpcError::Handshake)
        };

        let handshake = tokio::time::timeout(timeout, dial)
            .await
            .map_err(|_| RpcError::Timeout)??;

        tracing::debug!(
            addr,
            transport = handshake.auth_info.auth_type(),
            "Connected to greeter"
        );

        Ok(Self {
            conn: BufReader::new(handshake.conn),
            auth_info: handshake.auth_info,
            timeout,
            broken: false,
        })
    }

    /// What the client handshake established.
    pub fn auth_info(&self) -> &AuthInfo {
        &self.auth_info
    }

    pub async fn say_hello(&mut self, name: &str) -> Result<HelloReply, RpcError> {
        let request = RpcRequest::SayHello(HelloRequest { name: name.to_string() });
        match self.call(&request).await? {
            RpcResponse::Hello(reply) => Ok(reply),
            RpcResponse::Error { message } => Err(RpcError::Remote(message)),
        }
    }

    async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, RpcError> {
        if self.broken {
            return Err(RpcError::Closed);
        }
        let frame = encode(request)?;
        let timeout = self.timeout;
        let exchange = async {
            let conn = self.conn.get_mut();
            conn.write_all(&frame).await?;
            conn.flush().await?;

            let mut line = String::new();
            if self.conn.read_line(&mut line).await? == 0 {
                return Err(RpcError::Closed);
            }
            Ok::<_, RpcError>(serde_json::from_str(&line)?)
        };

        let result = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| RpcError::Timeout)
            .and_then(|response| response);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Greeter connection unusable after failed call");
            self.broken = true;
        }
        result
    }
}
