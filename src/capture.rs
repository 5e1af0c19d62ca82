// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Byte-level capture of one connection.
//!
//! [`CaptureStream`] sits between the HTTP client and the socket (or TLS
//! session) and mirrors every byte that crosses it into a [`Capture`].

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Buffers {
    outgoing: Vec<u8>,
    incoming: Vec<u8>,
}

/// Shared handle to the two capture buffers of one connection.
///
/// The stream half is moved into the connection task; this handle stays with
/// the caller so it can collect the bytes once the exchange completes.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    buffers: Arc<Mutex<Buffers>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buffers<R>(&self, f: impl FnOnce(&mut Buffers) -> R) -> R {
        // Buffers hold plain bytes, so a poisoned lock still has usable data.
        let mut guard = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn record_outgoing(&self, data: &[u8]) {
        self.with_buffers(|b| b.outgoing.extend_from_slice(data));
    }

    fn record_incoming(&self, data: &[u8]) {
        self.with_buffers(|b| b.incoming.extend_from_slice(data));
    }

    /// Return `(outgoing, incoming)` and reset both buffers.
    pub fn take(&self) -> (Bytes, Bytes) {
        self.with_buffers(|b| {
            (
                Bytes::from(std::mem::take(&mut b.outgoing)),
                Bytes::from(std::mem::take(&mut b.incoming)),
            )
        })
    }

    pub fn outgoing_len(&self) -> usize {
        self.with_buffers(|b| b.outgoing.len())
    }

    pub fn incoming_len(&self) -> usize {
        self.with_buffers(|b| b.incoming.len())
    }
}

/// A connection whose traffic is mirrored into a [`Capture`].
#[derive(Debug)]
pub struct CaptureStream<S> {
    inner: S,
    capture: Capture,
}

impl<S> CaptureStream<S> {
    /// Wrap `inner` with a fresh capture.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            capture: Capture::new(),
        }
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CaptureStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = &buf.filled()[before..];
        if !read.is_empty() {
            this.capture.record_incoming(read);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CaptureStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        this.capture.record_outgoing(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn mirrors_both_directions() -> anyhow::Result<()> {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut stream = CaptureStream::new(client);
        let capture = stream.capture().clone();

        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await?;
        let mut req = [0u8; 18];
        server.read_exact(&mut req).await?;

        server.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await?;
        let mut resp = [0u8; 19];
        stream.read_exact(&mut resp).await?;

        let (out, inc) = capture.take();
        assert_eq!(&out[..], b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(&inc[..], b"HTTP/1.1 200 OK\r\n\r\n");
        Ok(())
    }

    #[tokio::test]
    async fn only_bytes_actually_read_are_recorded() -> anyhow::Result<()> {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut stream = CaptureStream::new(client);

        server.write_all(b"abc").await?;
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await?;

        assert_eq!(n, 3);
        assert_eq!(stream.capture().incoming_len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn take_resets_buffers() -> anyhow::Result<()> {
        let (client, _server) = tokio::io::duplex(1024);
        let mut stream = CaptureStream::new(client);
        stream.write_all(b"ping").await?;

        let capture = stream.capture().clone();
        assert_eq!(capture.outgoing_len(), 4);
        let _ = capture.take();
        assert_eq!(capture.outgoing_len(), 0);
        assert_eq!(capture.incoming_len(), 0);

        stream.write_all(b"pong").await?;
        let (out, _) = capture.take();
        assert_eq!(&out[..], b"pong");
        Ok(())
    }

    #[tokio::test]
    async fn each_stream_gets_its_own_capture() -> anyhow::Result<()> {
        let (a, _sa) = tokio::io::duplex(64);
        let (b, _sb) = tokio::io::duplex(64);
        let mut first = CaptureStream::new(a);
        let mut second = CaptureStream::new(b);

        first.write_all(b"one").await?;
        second.write_all(b"two!").await?;

        assert_eq!(first.capture().outgoing_len(), 3);
        assert_eq!(second.capture().outgoing_len(), 4);
        Ok(())
    }
}
