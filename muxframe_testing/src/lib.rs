//! Utilities for driving a [`Connection`](muxframe::Connection) over
//! in-memory sockets during tests.
//!
//! ```rust
//! use muxframe::{CancellationToken, Connection};
//! use muxframe_testing::{FramePeer, memory_socket_pair};
//!
//! # async fn example() {
//! let (local, remote) = memory_socket_pair();
//! let conn = Connection::new(local);
//! let mut peer = FramePeer::new(remote);
//! let call = tokio::spawn(async move { conn.request_response("ping", CancellationToken::new()).await });
//! peer.answer_next(|payload| payload.to_ascii_uppercase()).await;
//! assert_eq!(&call.await.unwrap().unwrap()[..], b"PING");
//! # }
//! ```

pub mod frames;
pub mod logging;
pub mod macros;
pub mod memory_socket;
pub mod metrics;

pub use frames::{DEFAULT_FRAME_TIMEOUT, FramePeer, decode_frames, encode_frame};
pub use logging::{LoggerHandle, logger};
pub use memory_socket::{MemorySocket, SocketControl, memory_socket_pair};

/// Result type for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
