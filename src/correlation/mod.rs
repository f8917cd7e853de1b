//! Correlation identifiers and the table of pending calls.
//!
//! Every outbound request carries a fresh 128-bit random [`CorrelationId`]. The
//! peer echoes it in the matching response, and the [`CorrelationTable`] routes
//! that response back to the waiting caller.

mod table;

use std::fmt;

pub use table::{CorrelationTable, Outcome, PendingCall};
use uuid::Uuid;

/// 16-byte identifier binding a request to its response.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId([u8; 16]);

impl CorrelationId {
    /// Width of the identifier on the wire.
    pub const LEN: usize = 16;

    /// Generate a new random identifier.
    ///
    /// Identifiers are random version 4 UUIDs; collisions among the requests
    /// outstanding on one connection are not defended against.
    #[must_use]
    pub fn new_random() -> Self { Self(Uuid::new_v4().into_bytes()) }

    /// Wrap raw identifier bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self { Self(bytes) }

    /// Borrow the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] { &self.0 }
}

impl From<[u8; 16]> for CorrelationId {
    fn from(value: [u8; 16]) -> Self { Self(value) }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self { Self(value.into_bytes()) }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Uuid::from_bytes(self.0).hyphenated(), f)
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({self})")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn random_ids_are_distinct() {
        let ids: HashSet<_> = (0..1024).map(|_| CorrelationId::new_random()).collect();
        assert_eq!(ids.len(), 1024);
    }

    #[test]
    fn displays_as_hyphenated_uuid() {
        let id = CorrelationId::from_bytes([0x11; 16]);
        assert_eq!(id.to_string(), "11111111-1111-1111-1111-111111111111");
        assert_eq!(
            format!("{id:?}"),
            "CorrelationId(11111111-1111-1111-1111-111111111111)"
        );
    }
}
