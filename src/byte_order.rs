//! Helpers for explicit little-endian wire conversions.
//!
//! Envelope headers store multi-byte integers in little-endian order regardless
//! of the host platform. Keeping the conversions here makes every call site
//! explicit about wire endianness.

/// Serialise a `u16` in little-endian byte order.
///
/// # Examples
///
/// ```
/// use muxframe::byte_order::write_le_u16;
///
/// assert_eq!(write_le_u16(0x1234), [0x34, 0x12]);
/// ```
#[must_use]
pub fn write_le_u16(value: u16) -> [u8; 2] { value.to_le_bytes() }

/// Parse a little-endian `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use muxframe::byte_order::read_le_u16;
///
/// assert_eq!(read_le_u16([0x34, 0x12]), 0x1234);
/// ```
#[must_use]
pub fn read_le_u16(bytes: [u8; 2]) -> u16 { u16::from_le_bytes(bytes) }
