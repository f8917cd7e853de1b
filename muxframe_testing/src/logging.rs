//! Log capture for connection tests.
//!
//! `logtest` installs one global logger per process, so captures are
//! serialised through a shared mutex. Hold a [`LoggerHandle`] for the whole
//! test that inspects log output.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use log::Level;
use logtest::Logger;
use rstest::fixture;

/// Exclusive access to the captured `log` records.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Acquire the global capture, discarding records left by earlier tests.
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        // A test that panicked while holding the guard leaves the capture usable.
        let guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handle = Self { guard };
        handle.clear();
        handle
    }

    /// Discard every captured record.
    pub fn clear(&mut self) { while self.guard.pop().is_some() {} }

    /// Drain captured records, returning the messages logged at `level`.
    pub fn messages_at(&mut self, level: Level) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(record) = self.guard.pop() {
            if record.level() == level {
                messages.push(record.args().to_owned());
            }
        }
        messages
    }

    /// Drain captured records and report whether any message at `level`
    /// contains `needle`.
    pub fn logged(&mut self, level: Level, needle: &str) -> bool {
        self.messages_at(level)
            .iter()
            .any(|message| message.contains(needle))
    }
}

impl Default for LoggerHandle {
    fn default() -> Self { Self::new() }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
