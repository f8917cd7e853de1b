//! Connection lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Observable lifecycle state of a [`super::Connection`].
///
/// Transitions only move forward: `Open -> Closing -> Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Loops are running and requests are accepted.
    Open,
    /// Teardown has started; new requests fail with `ConnectionClosed`.
    Closing,
    /// Teardown finished. Terminal.
    Closed,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            OPEN => Self::Open,
            CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Atomic holder for [`ConnectionState`], shared between the handle and the
/// coordinator.
pub(super) struct StateCell(AtomicU8);

impl StateCell {
    pub(super) fn new() -> Self { Self(AtomicU8::new(OPEN)) }

    pub(super) fn load(&self) -> ConnectionState { ConnectionState::from_u8(self.0.load(Ordering::Acquire)) }

    /// Move from `Open` to `Closing`. Only the first call returns `true`.
    pub(super) fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enter the terminal state.
    pub(super) fn finish(&self) { self.0.store(CLOSED, Ordering::Release); }
}
