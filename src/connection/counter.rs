//! Connection identifiers and active connection counting.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Global gauge tracking active connections.
static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);

/// Source of process-unique connection identifiers.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to a connection, used in log output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(super) fn next() -> Self { Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ConnectionId({})", self.0) }
}

/// RAII guard incrementing [`ACTIVE_CONNECTIONS`] on creation and
/// decrementing it on drop.
///
/// The lifecycle coordinator holds the guard until teardown has finished.
pub(super) struct ActiveConnection;

impl ActiveConnection {
    pub(super) fn new() -> Self {
        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
        crate::metrics::inc_connections();
        Self
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
        crate::metrics::dec_connections();
    }
}

/// Return the current number of active connections.
#[must_use]
pub fn active_connection_count() -> u64 { ACTIVE_CONNECTIONS.load(Ordering::Relaxed) }
