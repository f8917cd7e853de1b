//! Outbound payload buffers.
//!
//! A [`Payload`] may be a single contiguous region or a sequence of segments.
//! The outbound serializer forwards segments as-is, so callers can assemble a
//! message from several buffers without concatenating them first.

use bytes::{Bytes, BytesMut};

/// Payload of an outbound frame, possibly split into several segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    segments: Vec<Bytes>,
}

impl Payload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a segment.
    pub fn push(&mut self, segment: impl Into<Bytes>) {
        let segment = segment.into();
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    /// Builder-style variant of [`Payload::push`].
    #[must_use]
    pub fn with_segment(mut self, segment: impl Into<Bytes>) -> Self {
        self.push(segment);
        self
    }

    /// Total number of payload bytes across all segments.
    #[must_use]
    pub fn len(&self) -> usize { self.segments.iter().map(Bytes::len).sum() }

    /// Returns `true` if the payload carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    /// Borrow the segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Bytes] { &self.segments }

    /// Consume the payload, yielding its segments.
    #[must_use]
    pub fn into_segments(self) -> Vec<Bytes> { self.segments }

    /// Flatten the payload into one contiguous buffer.
    ///
    /// Single-segment payloads are returned without copying.
    #[must_use]
    pub fn into_bytes(mut self) -> Bytes {
        match self.segments.len() {
            0 => Bytes::new(),
            1 => self.segments.pop().unwrap_or_default(),
            _ => {
                let mut buf = BytesMut::with_capacity(self.len());
                for segment in &self.segments {
                    buf.extend_from_slice(segment);
                }
                buf.freeze()
            }
        }
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self { Self::new().with_segment(value) }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self { Self::from(Bytes::from(value)) }
}

impl From<&'static [u8]> for Payload {
    fn from(value: &'static [u8]) -> Self { Self::from(Bytes::from_static(value)) }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self { Self::from(value.as_bytes()) }
}

impl From<String> for Payload {
    fn from(value: String) -> Self { Self::from(Bytes::from(value)) }
}

impl From<Vec<Bytes>> for Payload {
    fn from(value: Vec<Bytes>) -> Self {
        value
            .into_iter()
            .fold(Self::new(), |payload, segment| payload.with_segment(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmented_payload_reports_total_length() {
        let payload = Payload::from(vec![
            Bytes::from_static(b"he"),
            Bytes::new(),
            Bytes::from_static(b"llo"),
        ]);
        assert_eq!(payload.len(), 5);
        assert_eq!(payload.segments().len(), 2);
        assert_eq!(payload.into_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn empty_payload_flattens_to_empty_bytes() {
        let payload = Payload::from(Bytes::new());
        assert!(payload.is_empty());
        assert!(payload.into_bytes().is_empty());
    }

    #[test]
    fn single_segment_is_returned_unchanged() {
        let bytes = Bytes::from_static(b"ping");
        let payload = Payload::from(bytes.clone());
        assert_eq!(payload.into_bytes(), bytes);
    }
}
