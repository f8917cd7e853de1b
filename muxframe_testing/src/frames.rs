//! Frame-level helpers for driving a connection from the other end.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use muxframe::{CorrelationId, EnvelopeCodec, Frame, MessageSocket, MessageType, Received};
use tokio_util::codec::Decoder;

use crate::MemorySocket;

/// How long [`FramePeer::next_frame`] waits before giving up.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Encode one frame into wire bytes.
///
/// # Panics
///
/// Panics if `payload` exceeds the protocol maximum.
#[must_use]
pub fn encode_frame(message_type: MessageType, id: CorrelationId, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    muxframe::envelope::encode_frame(message_type, id, payload, &mut buf)
        .expect("payload within protocol limit");
    buf.freeze()
}

/// Decode every complete frame in `wire`.
///
/// # Panics
///
/// Panics on malformed input or trailing partial frames.
#[must_use]
pub fn decode_frames(wire: &[u8]) -> Vec<Frame> {
    let mut buf = BytesMut::from(wire);
    let mut codec = EnvelopeCodec::new();
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).expect("well-formed frames") {
        frames.push(frame);
    }
    assert!(buf.is_empty(), "{} trailing bytes after last frame", buf.len());
    frames
}

/// Raw protocol peer reading and writing frames on a [`MemorySocket`].
pub struct FramePeer {
    socket: MemorySocket,
    buffer: BytesMut,
    codec: EnvelopeCodec,
}

impl FramePeer {
    /// Wrap the peer end of a socket pair.
    #[must_use]
    pub fn new(socket: MemorySocket) -> Self {
        Self {
            socket,
            buffer: BytesMut::new(),
            codec: EnvelopeCodec::new(),
        }
    }

    /// The underlying socket.
    #[must_use]
    pub fn socket(&self) -> &MemorySocket { &self.socket }

    /// Send raw bytes as one message.
    ///
    /// # Panics
    ///
    /// Panics if the socket rejects the send.
    pub async fn send_raw(&self, bytes: impl Into<Bytes>) {
        self.socket.send(bytes.into()).await.expect("peer send");
    }

    /// Send a frame as one message.
    pub async fn send_frame(&self, message_type: MessageType, id: CorrelationId, payload: &[u8]) {
        self.send_raw(encode_frame(message_type, id, payload)).await;
    }

    /// Wait up to [`DEFAULT_FRAME_TIMEOUT`] for the next frame.
    ///
    /// Returns `None` on timeout, close frame, or socket error.
    pub async fn next_frame(&mut self) -> Option<Frame> { self.next_frame_within(DEFAULT_FRAME_TIMEOUT).await }

    /// Wait up to `limit` for the next frame.
    ///
    /// # Panics
    ///
    /// Panics if the connection sends a malformed frame.
    pub async fn next_frame_within(&mut self, limit: Duration) -> Option<Frame> {
        tokio::time::timeout(limit, self.read_frame()).await.ok().flatten()
    }

    async fn read_frame(&mut self) -> Option<Frame> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer).expect("well-formed frame") {
                return Some(frame);
            }
            match self.socket.receive(&mut chunk).await {
                Ok(Received { close: true, .. }) | Err(_) => return None,
                Ok(Received { len, .. }) => self.buffer.extend_from_slice(&chunk[..len]),
            }
        }
    }

    /// Answer the next request frame with `respond(payload)`, returning the
    /// request that was answered.
    pub async fn answer_next(&mut self, respond: impl FnOnce(&[u8]) -> Vec<u8>) -> Option<Frame> {
        let request = self.next_frame().await?;
        assert_eq!(request.message_type, MessageType::Request, "expected a request frame");
        let response = respond(&request.payload);
        self.send_frame(MessageType::Response, request.id, &response).await;
        Some(request)
    }
}
