//! Handler invoked for inbound requests.
//!
//! When the peer sends a request frame, the demultiplexer passes its payload to
//! the connection's [`RequestHandler`] and sends whatever it returns back as a
//! response carrying the same correlation id. [`EchoHandler`] is installed when
//! no handler is configured.
//!
//! Closures returning a future also implement the trait:
//!
//! ```no_run
//! use bytes::Bytes;
//! use muxframe::{Connection, Payload, StreamSocket};
//!
//! # async fn example(stream: tokio::io::DuplexStream) {
//! let conn = Connection::builder(StreamSocket::new(stream))
//!     .handler(|request: Bytes| async move { Payload::from(request.to_ascii_uppercase()) })
//!     .build()
//!     .expect("default config is valid");
//! # drop(conn);
//! # }
//! ```

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

use crate::payload::Payload;

/// Produces the response payload for an inbound request.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle one request payload.
    ///
    /// Requests are handled one at a time in arrival order; a slow handler
    /// delays the processing of later inbound frames.
    async fn handle(&self, request: Bytes) -> Payload;
}

/// Default handler answering each request with its own payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: Bytes) -> Payload { Payload::from(request) }
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Payload> + Send + 'static,
{
    async fn handle(&self, request: Bytes) -> Payload { (self)(request).await }
}
