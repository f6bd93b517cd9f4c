//! Rewindable connection wrapper.
//!
//! # Responsibilities
//! - Let the handshake layer look at the leading bytes of a stream
//! - Re-deliver every peeked byte to the next reader, in order, exactly once
//! - Pass writes, flushes and shutdowns straight through
//!
//! # Design Decisions
//! - Explicit prepend buffer instead of a `BufReader`, so nothing beyond the
//!   requested bytes is pulled off the socket before the handshake path is chosen
//! - Peeked bytes are read through a scratch buffer; a dropped `peek` future
//!   never leaves partial state behind

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

/// A stream whose leading bytes can be inspected without being consumed.
#[derive(Debug)]
pub struct RewindableConnection<IO> {
    inner: IO,
    /// Bytes read from `inner` but not yet delivered to a reader.
    buffer: Vec<u8>,
    /// Offset of the next undelivered byte in `buffer`.
    pos: usize,
}

impl<IO> RewindableConnection<IO> {
    /// Wrap a freshly accepted connection.
    pub fn new(inner: IO) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Bytes peeked but not yet delivered to a reader.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.pos..]
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &IO {
        &self.inner
    }

    /// Split into the underlying stream and the bytes it still owes a reader.
    pub fn into_parts(mut self) -> (IO, Vec<u8>) {
        let pending = self.buffer.split_off(self.pos);
        (self.inner, pending)
    }
}

impl<IO: AsyncRead + Unpin> RewindableConnection<IO> {
    /// Return up to `n` bytes at the logical read position without consuming them.
    ///
    /// A slice shorter than `n` means the peer closed the stream first. On a
    /// read error every byte gathered so far stays buffered for later reads.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }

        while self.buffer.len() < n {
            let mut chunk = vec![0u8; n - self.buffer.len()];
            match self.inner.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => self.buffer.extend_from_slice(&chunk[..read]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let available = n.min(self.buffer.len());
        Ok(&self.buffer[..available])
    }
}

impl<IO: AsyncRead + Unpin> AsyncRead for RewindableConnection<IO> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pos < this.buffer.len() {
            let pending = &this.buffer[this.pos..];
            let len = pending.len().min(buf.remaining());
            buf.put_slice(&pending[..len]);
            this.pos += len;

            if this.pos == this.buffer.len() {
                this.buffer = Vec::new();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<IO: AsyncWrite + Unpin> AsyncWrite for RewindableConnection<IO> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
