//! Canonical error and termination types for the crate.
//!
//! [`MuxError`] separates per-call failures (`SizeExceeded`, `Canceled`,
//! `ConnectionClosed`) from connection-fatal ones (`ProtocolViolation`,
//! `TransportFailure`). Fatal errors end the connection and are reported
//! through [`Termination`].

use std::{fmt, io, sync::Arc};

use thiserror::Error;

/// Malformed or unsupported envelope contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// The header carried a protocol version other than the supported one.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    /// The header carried a message type tag this version does not define.
    #[error("unknown message type tag {0}")]
    UnknownMessageType(u8),
    /// The length field exceeds the largest payload a frame may carry.
    #[error("payload length {len} exceeds the protocol maximum of {max}")]
    LengthOutOfRange {
        /// Length decoded from the header.
        len: usize,
        /// Largest length accepted on the wire.
        max: usize,
    },
    /// Fewer than a full header's worth of bytes were supplied to the decoder.
    #[error("truncated header: {0} bytes available")]
    TruncatedHeader(usize),
}

/// Errors surfaced by [`crate::Connection`] operations and its internal loops.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The peer sent a frame this endpoint cannot interpret. Fatal.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    /// The caller supplied a payload larger than the length field can encode.
    #[error("payload of {size} bytes exceeds the maximum of {max}")]
    SizeExceeded {
        /// Size of the rejected payload.
        size: usize,
        /// Largest payload accepted by the connection.
        max: usize,
    },
    /// The caller's cancellation fired before a response arrived.
    #[error("request canceled")]
    Canceled,
    /// The connection is closing or closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// The underlying socket failed to send or receive. Fatal.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] io::Error),
}

impl MuxError {
    /// Returns `true` if this error tears down the whole connection.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_) | Self::TransportFailure(_))
    }

    /// Short label used for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::Canceled => "canceled",
            Self::ConnectionClosed => "connection_closed",
            Self::TransportFailure(_) => "transport_failure",
        }
    }
}

/// How a connection reached its terminal state.
///
/// Observed through [`crate::connection::Completion`] and returned by
/// [`crate::Connection::dispose`].
#[derive(Clone, Debug)]
pub enum Termination {
    /// Teardown was requested locally.
    Disposed,
    /// A loop reached its natural end, typically because the peer sent a close
    /// frame.
    PeerClosed,
    /// A loop failed with a connection-fatal error.
    Failed(Arc<MuxError>),
}

impl Termination {
    /// Returns `true` unless the connection ended because of an error.
    #[must_use]
    pub fn is_clean(&self) -> bool { !matches!(self, Self::Failed(_)) }

    /// The fatal error that ended the connection, if any.
    #[must_use]
    pub fn error(&self) -> Option<&MuxError> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Disposed | Self::PeerClosed => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => f.write_str("disposed"),
            Self::PeerClosed => f.write_str("closed by peer"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Canonical result alias used by `muxframe` public APIs.
pub type Result<T> = std::result::Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MuxError::ProtocolViolation(ProtocolViolation::UnsupportedVersion(2)), true)]
    #[case(MuxError::TransportFailure(io::Error::other("reset")), true)]
    #[case(MuxError::SizeExceeded { size: 40_000, max: 32_767 }, false)]
    #[case(MuxError::Canceled, false)]
    #[case(MuxError::ConnectionClosed, false)]
    fn classifies_fatal_errors(#[case] err: MuxError, #[case] fatal: bool) {
        assert_eq!(err.is_connection_fatal(), fatal);
    }

    #[test]
    fn termination_exposes_failure() {
        let failed = Termination::Failed(Arc::new(MuxError::ProtocolViolation(
            ProtocolViolation::UnsupportedVersion(9),
        )));
        assert!(!failed.is_clean());
        assert!(matches!(
            failed.error(),
            Some(MuxError::ProtocolViolation(
                ProtocolViolation::UnsupportedVersion(9)
            ))
        ));
        assert!(Termination::Disposed.is_clean());
        assert!(Termination::PeerClosed.error().is_none());
    }

    #[test]
    fn display_includes_context() {
        let err = MuxError::SizeExceeded {
            size: 40_000,
            max: 32_767,
        };
        assert_eq!(
            err.to_string(),
            "payload of 40000 bytes exceeds the maximum of 32767"
        );
        assert_eq!(Termination::Disposed.to_string(), "disposed");
    }
}
