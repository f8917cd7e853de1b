//! Multiplexed request/response connection over one message socket.
//!
//! A [`Connection`] runs four tasks on a [`TaskTracker`]:
//!
//! - the outbound serializer, which turns queued write requests into one
//!   ordered byte stream;
//! - the transmit loop, which sends that stream on the socket;
//! - the receive loop, which feeds physical receives into the inbound stream;
//! - the demultiplexer, which parses frames, resolves pending calls, and
//!   answers inbound requests.
//!
//! Whichever task ends first, or an explicit [`Connection::dispose`], hands
//! control to the lifecycle coordinator, which tears everything down once and
//! publishes the outcome through [`Completion`].

mod completion;
mod counter;
mod demux;
mod outbound;
mod receive;
mod shutdown;
mod state;
mod transmit;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
pub use completion::Completion;
use counter::ActiveConnection;
pub use counter::{ConnectionId, active_connection_count};
use demux::Demultiplexer;
use log::info;
use outbound::{OutboundQueue, Serializer, WriteRequest};
use shutdown::{Coordinator, LoopKind, ShutdownHandle, ShutdownRequest};
pub use state::ConnectionState;
use state::StateCell;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;

use crate::{
    config::{ConfigError, ConnectionConfig},
    correlation::{CorrelationId, CorrelationTable, Outcome},
    envelope::MessageType,
    error::{MuxError, Result, Termination},
    hooks::{EchoHandler, RequestHandler},
    payload::Payload,
    pipe::pipe,
    socket::MessageSocket,
};

/// Handle to a multiplexed connection.
///
/// Handles are cheap to clone and may be used from any number of tasks
/// concurrently. When the last handle is dropped the connection is disposed
/// in the background.
///
/// # Examples
///
/// ```no_run
/// use muxframe::{Connection, StreamSocket};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(stream: tokio::io::DuplexStream) -> muxframe::Result<()> {
/// let conn = Connection::new(StreamSocket::new(stream));
/// let reply = conn.request_response("ping", CancellationToken::new()).await?;
/// assert_eq!(&reply[..], b"ping");
/// conn.dispose().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    table: CorrelationTable,
    outbound: OutboundQueue,
    shutdown: CancellationToken,
    state: Arc<StateCell>,
    completion: Completion,
    coordinator: ShutdownHandle,
    payload_limit: usize,
}

impl Drop for Inner {
    fn drop(&mut self) { self.coordinator.request(ShutdownRequest::Dispose); }
}

/// Builder for [`Connection`] with a custom configuration or handler.
pub struct ConnectionBuilder<S> {
    socket: S,
    config: ConnectionConfig,
    handler: Arc<dyn RequestHandler>,
}

impl<S: MessageSocket> ConnectionBuilder<S> {
    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the handler answering inbound requests.
    #[must_use]
    pub fn handler(mut self, handler: impl RequestHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Validate the configuration and start the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> std::result::Result<Connection, ConfigError> {
        self.config.validate()?;
        Ok(Connection::start(
            Arc::new(self.socket),
            &self.config,
            self.handler,
        ))
    }
}

impl Connection {
    /// Start a connection over `socket` with the default configuration and
    /// the echo handler.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new<S: MessageSocket>(socket: S) -> Self {
        Self::start(
            Arc::new(socket),
            &ConnectionConfig::default(),
            Arc::new(EchoHandler),
        )
    }

    /// Start a connection with `config` and the echo handler.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config<S: MessageSocket>(
        socket: S,
        config: ConnectionConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Self::builder(socket).config(config).build()
    }

    /// Begin configuring a connection over `socket`.
    #[must_use]
    pub fn builder<S: MessageSocket>(socket: S) -> ConnectionBuilder<S> {
        ConnectionBuilder {
            socket,
            config: ConnectionConfig::default(),
            handler: Arc::new(EchoHandler),
        }
    }

    fn start(
        socket: Arc<dyn MessageSocket>,
        config: &ConnectionConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        let id = ConnectionId::next();
        let counter = ActiveConnection::new();
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let table = CorrelationTable::new();
        let state = Arc::new(StateCell::new());
        let (completion_tx, completion) = Completion::channel();
        let (coordinator, requests) = ShutdownHandle::new();
        let (outbound, queue) = OutboundQueue::new();
        let (out_writer, out_reader) = pipe(config.outbound());
        let (in_writer, in_reader) = pipe(config.inbound());

        coordinator.spawn_loop(
            &tracker,
            LoopKind::Serializer,
            Serializer::new(queue, out_writer, shutdown.clone()).run(),
        );
        coordinator.spawn_loop(
            &tracker,
            LoopKind::Transmit,
            transmit::run(socket.clone(), out_reader, shutdown.clone()),
        );
        coordinator.spawn_loop(
            &tracker,
            LoopKind::Receive,
            receive::run(
                id,
                socket.clone(),
                in_writer,
                config.receive_buffer(),
                shutdown.clone(),
            ),
        );
        let demux = Demultiplexer {
            id,
            input: in_reader,
            table: table.clone(),
            outbound: outbound.clone(),
            handler,
            payload_limit: config.payload_limit(),
            shutdown: shutdown.clone(),
        };
        coordinator.spawn_loop(&tracker, LoopKind::Demultiplexer, demux.run());

        tokio::spawn(
            Coordinator {
                id,
                requests,
                socket: Some(socket),
                shutdown: shutdown.clone(),
                tracker,
                table: table.clone(),
                state: state.clone(),
                completion: completion_tx,
                close_timeout: config.close_deadline(),
                counter: Some(counter),
            }
            .run(),
        );
        info!(
            "connection opened: id={id}, muxframe_active_connections={}",
            active_connection_count()
        );

        Self {
            inner: Arc::new(Inner {
                id,
                table,
                outbound,
                shutdown,
                state,
                completion,
                coordinator,
                payload_limit: config.payload_limit(),
            }),
        }
    }

    /// Identifier used for this connection in log output.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.inner.id }

    /// Send `payload` as a request and wait for the matching response.
    ///
    /// Firing `cancel` before the request is written keeps it off the wire;
    /// firing it later abandons the call and any response that still arrives
    /// is discarded. Dropping the returned future has the same effect as
    /// canceling.
    ///
    /// # Errors
    ///
    /// - [`MuxError::SizeExceeded`] if the payload exceeds the configured
    ///   limit. Nothing is written.
    /// - [`MuxError::Canceled`] if `cancel` fires before the response arrives.
    /// - [`MuxError::ConnectionClosed`] if the connection is closing or closes
    ///   before the response arrives.
    pub async fn request_response(
        &self,
        payload: impl Into<Payload>,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        let inner = &self.inner;
        if inner.state.load() != ConnectionState::Open {
            return Err(MuxError::ConnectionClosed);
        }
        let payload = payload.into();
        let size = payload.len();
        if size > inner.payload_limit {
            return Err(MuxError::SizeExceeded {
                size,
                max: inner.payload_limit,
            });
        }
        let id = CorrelationId::new_random();
        let span = tracing::debug_span!(
            "muxframe.request",
            connection = inner.id.as_u64(),
            correlation_id = %id,
            size
        );
        self.exchange(id, payload, cancel).instrument(span).await
    }

    /// [`Connection::request_response`] with a deadline instead of a token.
    ///
    /// # Errors
    ///
    /// As for [`Connection::request_response`]; an elapsed deadline is
    /// reported as [`MuxError::Canceled`].
    pub async fn request_response_timeout(
        &self,
        payload: impl Into<Payload>,
        timeout: Duration,
    ) -> Result<Bytes> {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        tokio::time::timeout(timeout, self.request_response(payload, cancel))
            .await
            .unwrap_or(Err(MuxError::Canceled))
    }

    async fn exchange(
        &self,
        id: CorrelationId,
        payload: Payload,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        let inner = &self.inner;
        let mut call = inner.table.register(id);
        let write_cancel = cancel.child_token();
        let _write_guard = write_cancel.clone().drop_guard();
        let write = WriteRequest::new(MessageType::Request, id, payload, write_cancel);

        tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(MuxError::Canceled),
            () = inner.shutdown.cancelled() => return Err(MuxError::ConnectionClosed),
            admitted = inner.outbound.submit(write) => admitted?,
        }
        tracing::debug!("request admitted");

        // Teardown settles every admitted call, after the demultiplexer has
        // resolved responses that were already received.
        let outcome = tokio::select! {
            biased;

            outcome = call.outcome() => outcome,
            () = cancel.cancelled() => {
                inner.table.cancel(&id);
                Outcome::Canceled
            }
        };
        tracing::debug!(?outcome, "request resolved");
        match outcome {
            Outcome::Response(payload) => Ok(payload),
            Outcome::Canceled => Err(MuxError::Canceled),
            Outcome::Closed => Err(MuxError::ConnectionClosed),
        }
    }

    /// Tear the connection down and wait for teardown to finish.
    ///
    /// Safe to call any number of times from any number of tasks; every
    /// caller observes the same [`Termination`]. A connection that already
    /// closed reports how it ended.
    pub async fn dispose(&self) -> Termination {
        self.inner.coordinator.request(ShutdownRequest::Dispose);
        self.inner.completion.wait().await
    }

    /// Signal resolving once teardown has finished.
    #[must_use]
    pub fn completion(&self) -> Completion { self.inner.completion.clone() }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.inner.state.load() }

    /// Returns `true` while new requests are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool { self.state() == ConnectionState::Open }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.inner.table.len() }
}
