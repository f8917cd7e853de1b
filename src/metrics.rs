//! Metric helpers for `muxframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open connections.
pub const CONNECTIONS_ACTIVE: &str = "muxframe_connections_active";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "muxframe_frames_processed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "muxframe_errors_total";
/// Name of the counter tracking canceled writes skipped before transmission.
pub const REQUESTS_DROPPED: &str = "muxframe_requests_dropped_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames parsed from the socket.
    Inbound,
    /// Frames serialized for the socket.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error occurrence labelled with its kind.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record writes discarded because their caller canceled first.
pub fn inc_dropped(count: u64) {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_DROPPED).increment(count);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}
