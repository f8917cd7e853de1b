//! Connection configuration.
//!
//! [`ConnectionConfig`] sizes the buffers between the connection loops and
//! bounds how long teardown waits for the socket's close handshake.

use std::time::Duration;

use thiserror::Error;

use crate::envelope::MAX_PAYLOAD_LEN;

/// Default number of bytes requested per physical receive.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 4096;
/// Default number of chunks buffered between two loops.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;
/// Default bound on the close handshake during teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by [`ConnectionConfig::validate`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The receive buffer must hold at least one byte.
    #[error("receive buffer size must be at least 1 byte")]
    ZeroReceiveBuffer,
    /// Pipe capacities must be at least one chunk.
    #[error("invalid pipe capacities; inbound={inbound}, outbound={outbound}; each must be >= 1")]
    InvalidCapacity {
        /// Configured inbound capacity.
        inbound: usize,
        /// Configured outbound capacity.
        outbound: usize,
    },
    /// The payload limit may not exceed what the length field carries.
    #[error("max payload length {0} exceeds the protocol maximum of {max}", max = MAX_PAYLOAD_LEN)]
    PayloadLimitTooLarge(usize),
}

/// Tunables for a [`crate::Connection`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    receive_buffer_size: usize,
    inbound_capacity: usize,
    outbound_capacity: usize,
    max_payload_len: usize,
    close_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            inbound_capacity: DEFAULT_PIPE_CAPACITY,
            outbound_capacity: DEFAULT_PIPE_CAPACITY,
            max_payload_len: MAX_PAYLOAD_LEN,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Bytes requested from the socket per receive.
    #[must_use]
    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Chunks buffered between the receive loop and the demultiplexer.
    #[must_use]
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Chunks buffered between the outbound serializer and the transmit loop.
    #[must_use]
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Largest request payload accepted by
    /// [`crate::Connection::request_response`]. May only lower the protocol
    /// limit.
    #[must_use]
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    /// How long teardown waits for the socket's close handshake.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Check the configuration for values the connection cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receive_buffer_size == 0 {
            return Err(ConfigError::ZeroReceiveBuffer);
        }
        if self.inbound_capacity == 0 || self.outbound_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                inbound: self.inbound_capacity,
                outbound: self.outbound_capacity,
            });
        }
        if self.max_payload_len > MAX_PAYLOAD_LEN {
            return Err(ConfigError::PayloadLimitTooLarge(self.max_payload_len));
        }
        Ok(())
    }

    pub(crate) fn receive_buffer(&self) -> usize { self.receive_buffer_size }

    pub(crate) fn inbound(&self) -> usize { self.inbound_capacity }

    pub(crate) fn outbound(&self) -> usize { self.outbound_capacity }

    pub(crate) fn payload_limit(&self) -> usize { self.max_payload_len }

    pub(crate) fn close_deadline(&self) -> Duration { self.close_timeout }
}
