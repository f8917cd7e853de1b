//! Envelope wire format (protocol version 1).
//!
//! Every frame starts with a fixed 32-byte header followed immediately by the
//! payload:
//!
//! ```text
//! ┌─────────┬──────────────────┬────────────┬──────┬────────────────┬─────────┐
//! │ Version │ Correlation id   │ Length     │ Type │ Reserved       │ Payload │
//! │ (1B)    │ (16B)            │ (2B LE)    │ (1B) │ (12B, zeroed)  │ (N B)   │
//! └─────────┴──────────────────┴────────────┴──────┴────────────────┴─────────┘
//! ```
//!
//! The length field is two bytes wide, but payloads are capped at
//! [`MAX_PAYLOAD_LEN`] (`i16::MAX`) so peers that read the field as a signed
//! integer never observe a negative length.

mod codec;

use bytes::{BufMut, Bytes, BytesMut};
pub use codec::EnvelopeCodec;

use crate::{
    byte_order::{read_le_u16, write_le_u16},
    correlation::CorrelationId,
    error::{MuxError, ProtocolViolation},
};

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed envelope header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD_LEN: usize = i16::MAX as usize;

const VERSION_OFFSET: usize = 0;
const ID_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = ID_OFFSET + CorrelationId::LEN;
const TYPE_OFFSET: usize = LENGTH_OFFSET + 2;
const RESERVED_OFFSET: usize = TYPE_OFFSET + 1;

/// Message type tag carried in byte 19 of the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Reply to an earlier request with the same correlation id.
    Response = 0,
    /// A call expecting a response.
    Request = 1,
}

impl MessageType {
    /// Wire tag for this message type.
    #[must_use]
    pub const fn tag(self) -> u8 { self as u8 }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Request => "request",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolViolation;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Response),
            1 => Ok(Self::Request),
            other => Err(ProtocolViolation::UnknownMessageType(other)),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Decoded envelope header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Protocol version byte; always [`PROTOCOL_VERSION`] once decoded.
    pub version: u8,
    /// Correlation id binding requests to responses.
    pub id: CorrelationId,
    /// Number of payload bytes following the header.
    pub payload_len: usize,
    /// Request or response.
    pub message_type: MessageType,
}

impl EnvelopeHeader {
    /// Total size of the frame described by this header.
    #[must_use]
    pub fn frame_len(&self) -> usize { HEADER_SIZE + self.payload_len }
}

/// A complete frame: header fields plus payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Request or response.
    pub message_type: MessageType,
    /// Correlation id shared by a request and its response.
    pub id: CorrelationId,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(message_type: MessageType, id: CorrelationId, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    #[must_use]
    pub fn wire_size(&self) -> usize { HEADER_SIZE + self.payload.len() }
}

/// Build a header for a payload of `payload_len` bytes.
///
/// The header is assembled in a fresh zeroed array, so reserved bytes are
/// always zero.
///
/// # Errors
///
/// Returns [`MuxError::SizeExceeded`] if `payload_len` exceeds
/// [`MAX_PAYLOAD_LEN`].
pub fn encode_header(
    message_type: MessageType,
    id: CorrelationId,
    payload_len: usize,
) -> Result<[u8; HEADER_SIZE], MuxError> {
    let len = u16::try_from(payload_len)
        .ok()
        .filter(|_| payload_len <= MAX_PAYLOAD_LEN)
        .ok_or(MuxError::SizeExceeded {
            size: payload_len,
            max: MAX_PAYLOAD_LEN,
        })?;

    let mut header = [0u8; HEADER_SIZE];
    header[VERSION_OFFSET] = PROTOCOL_VERSION;
    header[ID_OFFSET..LENGTH_OFFSET].copy_from_slice(id.as_bytes());
    header[LENGTH_OFFSET..TYPE_OFFSET].copy_from_slice(&write_le_u16(len));
    header[TYPE_OFFSET] = message_type.tag();
    debug_assert!(header[RESERVED_OFFSET..].iter().all(|b| *b == 0));
    Ok(header)
}

/// Append a complete frame (header and payload) to `dst`.
///
/// # Errors
///
/// Returns [`MuxError::SizeExceeded`] if the payload is too large.
pub fn encode_frame(
    message_type: MessageType,
    id: CorrelationId,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), MuxError> {
    let header = encode_header(message_type, id, payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// Decode the fixed header at the start of `src`.
///
/// Reserved bytes are ignored.
///
/// # Errors
///
/// Returns a [`ProtocolViolation`] if fewer than [`HEADER_SIZE`] bytes are
/// supplied, the version is unsupported, the type tag is unknown, or the length
/// exceeds [`MAX_PAYLOAD_LEN`].
pub fn decode_header(src: &[u8]) -> Result<EnvelopeHeader, ProtocolViolation> {
    let Some(header) = src.get(..HEADER_SIZE) else {
        return Err(ProtocolViolation::TruncatedHeader(src.len()));
    };

    let version = header[VERSION_OFFSET];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolViolation::UnsupportedVersion(version));
    }

    let mut id = [0u8; CorrelationId::LEN];
    id.copy_from_slice(&header[ID_OFFSET..LENGTH_OFFSET]);

    let payload_len = usize::from(read_le_u16([
        header[LENGTH_OFFSET],
        header[LENGTH_OFFSET + 1],
    ]));
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(ProtocolViolation::LengthOutOfRange {
            len: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let message_type = MessageType::try_from(header[TYPE_OFFSET])?;

    Ok(EnvelopeHeader {
        version,
        id: CorrelationId::from_bytes(id),
        payload_len,
        message_type,
    })
}

#[cfg(test)]
mod tests;
