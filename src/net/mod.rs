//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection id, active tracking)
//!     → rewind.rs (peekable wrapper owned by the handshake)
//!     → sniff.rs (TLS record or plaintext frame?)
//!     → Hand off to the credential's chosen handshake path
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Exactly one byte is inspected before the handshake path is chosen

pub mod connection;
pub mod listener;
pub mod rewind;
pub mod sniff;

pub use listener::Listener;
pub use rewind::RewindableConnection;
pub use sniff::{sniff, SniffResult, TLS_HANDSHAKE_CONTENT_TYPE};
