//! Assertion macros shared by integration tests.

/// Await a `request_response` future and panic with the call site on error.
#[macro_export]
macro_rules! call_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("request failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await a frame from a [`FramePeer`](crate::FramePeer) and panic with the
/// call site if none arrives.
#[macro_export]
macro_rules! recv_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("no frame received at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

pub use crate::{call_expect, recv_expect};
