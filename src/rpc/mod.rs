//! Minimal greeter RPC over pluggable transport credentials.
//!
//! # Data Flow
//! ```text
//! GreeterClient::connect
//!     → TCP dial → credentials.client_handshake
//!     → say_hello: one JSON line out, one JSON line back
//!
//! RpcServer::run
//!     → Listener::accept → credentials.server_handshake (deadline)
//!     → per-connection task answering JSON lines
//! ```
//!
//! # Design Decisions
//! - Newline-delimited JSON keeps the plaintext framing trivially distinct
//!   from a TLS record
//! - The reply carries the transport the server saw, so clients can tell how
//!   they were accepted

use thiserror::Error;

use crate::credentials::HandshakeError;

pub mod client;
pub mod message;
pub mod server;

pub use client::GreeterClient;
pub use message::{HelloReply, HelloRequest, RpcRequest, RpcResponse};
pub use server::RpcServer;

/// Errors seen by RPC clients.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("operation timed out")]
    Timeout,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("server error: {0}")]
    Remote(String),
}
