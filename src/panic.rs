//! Utilities for working with panic payloads.
//!
//! Request handlers run inside the demultiplexer; a panicking handler is
//! caught and logged with the message extracted here.

use std::{any::Any, fmt};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to a placeholder otherwise.
///
/// ```
/// use muxframe::panic::format_panic;
///
/// let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(&*boxed).to_string(), "boom");
/// let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
/// assert_eq!(format_panic(&*boxed).to_string(), "bang");
/// let boxed: Box<dyn std::any::Any + Send> = Box::new(5_u32);
/// assert_eq!(format_panic(&*boxed).to_string(), "<non-string panic payload>");
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("<non-string panic payload>")
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
pub fn format_panic(payload: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(payload) }
