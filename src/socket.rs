//! Message-oriented socket abstraction consumed by [`crate::Connection`].
//!
//! A [`MessageSocket`] is a duplex socket such as a WebSocket: it sends binary
//! messages, receives into caller-provided buffers, and performs a close
//! handshake. One task sends while another receives, so implementations must
//! accept concurrent `send` and `receive` calls.
//!
//! [`StreamSocket`] adapts any byte stream implementing `AsyncRead` and
//! `AsyncWrite`.

use std::{
    fmt, io,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};

/// Result of a single physical receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Received {
    /// Number of bytes written into the buffer.
    pub len: usize,
    /// `true` when the peer sent a close frame; `len` is then zero.
    pub close: bool,
}

impl Received {
    /// A receive that produced `len` bytes of data.
    #[must_use]
    pub const fn data(len: usize) -> Self { Self { len, close: false } }

    /// A receive that observed the peer's close frame.
    #[must_use]
    pub const fn close() -> Self {
        Self {
            len: 0,
            close: true,
        }
    }
}

/// Reason reported to the peer when the connection closes the socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Orderly shutdown.
    Normal,
    /// The peer violated the envelope protocol.
    ProtocolError,
    /// A local failure ended the connection.
    InternalError,
}

impl CloseReason {
    /// WebSocket-compatible status code for this reason.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ProtocolError => 1002,
            Self::InternalError => 1011,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal closure",
            Self::ProtocolError => "protocol error",
            Self::InternalError => "internal error",
        })
    }
}

/// Duplex, message-oriented socket.
#[async_trait]
pub trait MessageSocket: Send + Sync + 'static {
    /// Send one binary message.
    async fn send(&self, data: Bytes) -> io::Result<()>;

    /// Receive into `buf`, returning how many bytes were written or that the
    /// peer closed.
    async fn receive(&self, buf: &mut [u8]) -> io::Result<Received>;

    /// Start (or complete) the close handshake.
    async fn close(&self, reason: CloseReason) -> io::Result<()>;

    /// Returns `true` once this side has completed its close handshake.
    fn close_completed(&self) -> bool;
}

/// [`MessageSocket`] over a byte stream.
///
/// Each `send` writes and flushes the message bytes; end-of-stream on the read
/// half is reported as a close frame; `close` shuts down the write half.
pub struct StreamSocket<T> {
    reader: Mutex<ReadHalf<T>>,
    writer: Mutex<WriteHalf<T>>,
    closed: AtomicBool,
}

impl<T> StreamSocket<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Wrap `stream`.
    pub fn new(stream: T) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<T> MessageSocket for StreamSocket<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, data: Bytes) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "socket already closed",
            ));
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(&data).await?;
        writer.flush().await
    }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<Received> {
        if buf.is_empty() {
            return Ok(Received::data(0));
        }
        let mut reader = self.reader.lock().await;
        match reader.read(buf).await? {
            0 => Ok(Received::close()),
            n => Ok(Received::data(n)),
        }
    }

    async fn close(&self, _reason: CloseReason) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.writer.lock().await.shutdown().await
    }

    fn close_completed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn stream_socket_round_trips_bytes() {
        let (left, right) = duplex(64);
        let left = StreamSocket::new(left);
        let right = StreamSocket::new(right);

        left.send(Bytes::from_static(b"hello")).await.expect("send");
        let mut buf = [0u8; 16];
        let received = right.receive(&mut buf).await.expect("receive");
        assert_eq!(received, Received::data(5));
        assert_eq!(&buf[..5], b"hello");
    }

    #[tokio::test]
    async fn close_is_reported_as_close_frame() {
        let (left, right) = duplex(64);
        let left = StreamSocket::new(left);
        let right = StreamSocket::new(right);

        left.close(CloseReason::Normal).await.expect("close");
        assert!(left.close_completed());
        left.close(CloseReason::Normal)
            .await
            .expect("second close is a no-op");

        let mut buf = [0u8; 16];
        assert_eq!(
            right.receive(&mut buf).await.expect("receive"),
            Received::close()
        );
        assert!(left.send(Bytes::from_static(b"late")).await.is_err());
    }

    #[test]
    fn close_reasons_map_to_websocket_codes() {
        assert_eq!(CloseReason::Normal.code(), 1000);
        assert_eq!(CloseReason::ProtocolError.code(), 1002);
        assert_eq!(CloseReason::InternalError.code(), 1011);
        assert_eq!(CloseReason::Normal.to_string(), "normal closure");
    }
}
