//! Outbound serializer.
//!
//! Callers and the demultiplexer submit [`WriteRequest`]s through a queue of
//! capacity one. A single worker drains it and writes each frame, header then
//! payload segments, into the outbound pipe before taking the next, so bytes
//! from different frames never interleave.

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    correlation::CorrelationId,
    envelope::{MessageType, encode_header},
    error::MuxError,
    metrics::{self, Direction},
    payload::Payload,
    pipe::{PipeClosed, PipeWriter},
};

/// Admission slots in the outbound queue.
const QUEUE_CAPACITY: usize = 1;

/// One frame awaiting serialization.
pub(super) struct WriteRequest {
    message_type: MessageType,
    id: CorrelationId,
    payload: Payload,
    cancel: CancellationToken,
}

impl WriteRequest {
    /// Create a request that is skipped if `cancel` fires before the
    /// serializer reaches it.
    pub(super) fn new(
        message_type: MessageType,
        id: CorrelationId,
        payload: Payload,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            message_type,
            id,
            payload,
            cancel,
        }
    }
}

/// Producer side of the outbound queue, shared by every writer.
#[derive(Clone)]
pub(super) struct OutboundQueue {
    tx: mpsc::Sender<WriteRequest>,
}

impl OutboundQueue {
    pub(super) fn new() -> (Self, mpsc::Receiver<WriteRequest>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Wait until the serializer admits `request`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ConnectionClosed`] if the serializer has stopped.
    pub(super) async fn submit(&self, request: WriteRequest) -> Result<(), MuxError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| MuxError::ConnectionClosed)
    }
}

/// Single worker turning queued requests into the outbound byte stream.
pub(super) struct Serializer {
    queue: mpsc::Receiver<WriteRequest>,
    output: PipeWriter,
    shutdown: CancellationToken,
}

impl Serializer {
    pub(super) fn new(
        queue: mpsc::Receiver<WriteRequest>,
        output: PipeWriter,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            output,
            shutdown,
        }
    }

    /// Drain the queue until shutdown or until the transmit loop stops
    /// reading.
    ///
    /// Pipe closure is a natural end: the loop that closed it reports its own
    /// outcome to the coordinator.
    pub(super) async fn run(mut self) -> Result<(), MuxError> {
        let shutdown = self.shutdown.clone();
        loop {
            let request = tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                next = self.queue.recv() => match next {
                    Some(request) => request,
                    None => break,
                },
            };
            let written = tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                written = self.write(request) => written,
            };
            if written.is_err() {
                debug!("outbound pipe completed; serializer stopping");
                break;
            }
        }
        self.drain();
        Ok(())
    }

    async fn write(&self, request: WriteRequest) -> Result<(), PipeClosed> {
        let WriteRequest {
            message_type,
            id,
            payload,
            cancel,
        } = request;
        if cancel.is_cancelled() {
            debug!("skipping canceled write: id={id}, type={message_type}");
            metrics::inc_dropped(1);
            return Ok(());
        }
        let header = match encode_header(message_type, id, payload.len()) {
            Ok(header) => header,
            Err(e) => {
                warn!("discarding unencodable frame: id={id}, type={message_type}, error={e}");
                metrics::inc_errors(e.kind());
                return Ok(());
            }
        };
        self.output.write(Bytes::copy_from_slice(&header)).await?;
        for segment in payload.into_segments() {
            self.output.write(segment).await?;
        }
        metrics::inc_frames(Direction::Outbound);
        Ok(())
    }

    /// Close the queue and discard whatever is still waiting in it.
    fn drain(&mut self) {
        self.queue.close();
        let mut dropped = 0_u64;
        while self.queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("discarded queued writes during shutdown: count={dropped}");
            metrics::inc_dropped(dropped);
        }
    }
}
