//! Demultiplexer: inbound byte stream to frames.
//!
//! Bytes from the receive loop accumulate in a buffer; [`EnvelopeCodec`]
//! extracts every complete frame and leaves partial frames buffered until
//! more bytes arrive. Responses resolve pending calls; requests go to the
//! [`RequestHandler`] and its output is queued as a response with the same
//! correlation id.

use std::{panic::AssertUnwindSafe, sync::Arc};

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use log::{debug, warn};
use tokio_util::{codec::Decoder, sync::CancellationToken};

use super::{
    ConnectionId,
    outbound::{OutboundQueue, WriteRequest},
};
use crate::{
    correlation::{CorrelationId, CorrelationTable},
    envelope::{EnvelopeCodec, Frame, MessageType},
    error::MuxError,
    hooks::RequestHandler,
    metrics::{self, Direction},
    panic::format_panic,
    pipe::PipeReader,
};

pub(super) struct Demultiplexer {
    pub(super) id: ConnectionId,
    pub(super) input: PipeReader,
    pub(super) table: CorrelationTable,
    pub(super) outbound: OutboundQueue,
    pub(super) handler: Arc<dyn RequestHandler>,
    pub(super) payload_limit: usize,
    pub(super) shutdown: CancellationToken,
}

/// What the loop does after dispatching a frame.
enum Flow {
    Continue,
    Stop,
}

impl Demultiplexer {
    /// Parse and dispatch frames until the inbound stream completes or
    /// shutdown fires.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ProtocolViolation`] for a malformed header. The
    /// error is fatal to the connection.
    pub(super) async fn run(mut self) -> Result<(), MuxError> {
        let mut codec = EnvelopeCodec::new();
        let mut buffer = BytesMut::new();
        let result = loop {
            let chunk = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    break self.drain_committed(&mut codec, &mut buffer);
                }
                chunk = self.input.read() => chunk,
            };
            let Some(chunk) = chunk else {
                if !buffer.is_empty() {
                    debug!(
                        "inbound stream ended mid-frame: id={}, buffered={}",
                        self.id,
                        buffer.len()
                    );
                }
                break Ok(());
            };
            buffer.extend_from_slice(&chunk);
            match self.drain_frames(&mut codec, &mut buffer).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break self.drain_committed(&mut codec, &mut buffer),
                Err(e) => break Err(e),
            }
        };
        self.input.complete();
        result
    }

    /// Settle responses the receive loop committed before shutdown.
    ///
    /// Requests found here are not answered: the outbound side is already
    /// stopping.
    fn drain_committed(
        &mut self,
        codec: &mut EnvelopeCodec,
        buffer: &mut BytesMut,
    ) -> Result<(), MuxError> {
        while let Some(chunk) = self.input.try_read() {
            buffer.extend_from_slice(&chunk);
        }
        while let Some(frame) = codec.decode(buffer)? {
            metrics::inc_frames(Direction::Inbound);
            match frame.message_type {
                MessageType::Response => {
                    if !self.table.resolve(&frame.id, frame.payload) {
                        debug!("dropping response without pending request: id={}", frame.id);
                    }
                }
                MessageType::Request => {
                    debug!("skipping request received during shutdown: id={}", frame.id);
                }
            }
        }
        Ok(())
    }

    async fn drain_frames(
        &self,
        codec: &mut EnvelopeCodec,
        buffer: &mut BytesMut,
    ) -> Result<Flow, MuxError> {
        while let Some(frame) = codec.decode(buffer)? {
            metrics::inc_frames(Direction::Inbound);
            if let Flow::Stop = self.dispatch(frame).await {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    async fn dispatch(&self, frame: Frame) -> Flow {
        let Frame {
            message_type,
            id,
            payload,
        } = frame;
        match message_type {
            MessageType::Response => {
                if !self.table.resolve(&id, payload) {
                    debug!("dropping response without pending request: id={id}");
                }
                Flow::Continue
            }
            MessageType::Request => self.answer(id, payload).await,
        }
    }

    async fn answer(&self, id: CorrelationId, request: Bytes) -> Flow {
        let handled = tokio::select! {
            biased;

            () = self.shutdown.cancelled() => return Flow::Stop,
            handled = AssertUnwindSafe(self.handler.handle(request)).catch_unwind() => handled,
        };
        let response = match handled {
            Ok(response) => response,
            Err(panic) => {
                warn!(
                    "request handler panicked: id={}, correlation_id={id}, panic={}",
                    self.id,
                    format_panic(&*panic)
                );
                metrics::inc_errors("handler_panic");
                return Flow::Continue;
            }
        };
        if response.len() > self.payload_limit {
            warn!(
                "dropping oversized response: id={}, correlation_id={id}, size={}, max={}",
                self.id,
                response.len(),
                self.payload_limit
            );
            metrics::inc_errors("oversized_response");
            return Flow::Continue;
        }
        let write = WriteRequest::new(
            MessageType::Response,
            id,
            response,
            self.shutdown.child_token(),
        );
        let admitted = tokio::select! {
            biased;

            () = self.shutdown.cancelled() => return Flow::Stop,
            admitted = self.outbound.submit(write) => admitted,
        };
        match admitted {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }
}
