//! Handshake sniffing.
//!
//! Decides from the first byte whether a client opened with a TLS record.
//! Only the record content type is checked; the rest of the handshake is
//! left to the TLS implementation once the stream is handed over.

use std::io;

use tokio::io::AsyncRead;

use super::rewind::RewindableConnection;

/// TLS record content type for `handshake` (RFC 8446 §5.1).
pub const TLS_HANDSHAKE_CONTENT_TYPE: u8 = 0x16;

/// Outcome of sniffing a connection preface.
#[derive(Debug)]
pub enum SniffResult {
    /// The client opened with a TLS handshake record.
    Secure,
    /// The client opened with anything else.
    Plaintext,
    /// No byte could be read: the peer closed or the read failed.
    Indeterminate(io::Error),
}

impl SniffResult {
    pub fn is_secure(&self) -> bool {
        matches!(self, SniffResult::Secure)
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self, SniffResult::Plaintext)
    }
}

/// Classify a connection from its first byte.
///
/// Total over every byte value; content alone never yields `Indeterminate`.
pub fn classify(first: u8) -> SniffResult {
    if first == TLS_HANDSHAKE_CONTENT_TYPE {
        SniffResult::Secure
    } else {
        SniffResult::Plaintext
    }
}

/// Peek one byte from `conn` and classify it, leaving the byte in place.
pub async fn sniff<IO>(conn: &mut RewindableConnection<IO>) -> SniffResult
where
    IO: AsyncRead + Unpin,
{
    match conn.peek(1).await {
        Ok([first, ..]) => classify(*first),
        Ok([]) => SniffResult::Indeterminate(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before sending any data",
        )),
        Err(e) => SniffResult::Indeterminate(e),
    }
}
