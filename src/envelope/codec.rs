//! `tokio_util` codec for envelope frames.
//!
//! The decoder consumes exactly one complete frame per call and leaves any
//! trailing partial frame buffered, so frames split across arbitrary receive
//! boundaries reassemble identically.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Frame, HEADER_SIZE, decode_header, encode_frame};
use crate::error::MuxError;

/// Stateless encoder/decoder for [`Frame`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self { Self }
}

impl Decoder for EnvelopeCodec {
    type Item = Frame;
    type Error = MuxError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = decode_header(src)?;
        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.payload_len).freeze();
        Ok(Some(Frame {
            message_type: header.message_type,
            id: header.id,
            payload,
        }))
    }
}

impl Encoder<Frame> for EnvelopeCodec {
    type Error = MuxError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item.message_type, item.id, &item.payload, dst)
    }
}
