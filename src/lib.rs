#![doc(html_root_url = "https://docs.rs/muxframe/latest")]
//! Public API for the `muxframe` library.
//!
//! This crate multiplexes concurrent request/response exchanges over a single
//! duplex, message-oriented socket. Every frame carries a fixed 32-byte
//! envelope header with a 128-bit correlation id that routes each response
//! back to the call that issued the matching request.

pub mod byte_order;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod panic;
pub mod payload;
mod pipe;
pub mod socket;

pub use config::{ConfigError, ConnectionConfig};
pub use connection::{
    Completion,
    Connection,
    ConnectionBuilder,
    ConnectionId,
    ConnectionState,
    active_connection_count,
};
pub use correlation::{CorrelationId, CorrelationTable, Outcome, PendingCall};
pub use envelope::{EnvelopeCodec, EnvelopeHeader, Frame, HEADER_SIZE, MAX_PAYLOAD_LEN, MessageType};
pub use error::{MuxError, ProtocolViolation, Result, Termination};
pub use hooks::{EchoHandler, RequestHandler};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED, REQUESTS_DROPPED};
pub use payload::Payload;
pub use socket::{CloseReason, MessageSocket, Received, StreamSocket};
/// Re-exported so callers can build cancellation tokens without naming
/// `tokio_util` directly.
pub use tokio_util::sync::CancellationToken;
