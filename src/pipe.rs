//! Bounded byte streams linking the connection loops.
//!
//! A pipe carries ready chunks of bytes from exactly one producer to exactly one
//! consumer. The bounded channel underneath provides back-pressure: a writer
//! waits once `capacity` chunks are buffered and unread.

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Error returned when the opposite end of a pipe has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("pipe completed")]
pub(crate) struct PipeClosed;

/// Create a pipe buffering at most `capacity` chunks.
pub(crate) fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PipeWriter { tx }, PipeReader { rx })
}

/// Producer end of a pipe. Dropping it completes the stream.
pub(crate) struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
}

impl PipeWriter {
    /// Commit a chunk, waiting for capacity if the pipe is full.
    ///
    /// Empty chunks are discarded.
    pub(crate) async fn write(&self, chunk: Bytes) -> Result<(), PipeClosed> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(chunk).await.map_err(|_| PipeClosed)
    }
}

/// Consumer end of a pipe.
pub(crate) struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
}

impl PipeReader {
    /// Wait for the next chunk; `None` once the writer has completed and every
    /// buffered chunk has been read.
    pub(crate) async fn read(&mut self) -> Option<Bytes> { self.rx.recv().await }

    /// Take a chunk only if one is already buffered.
    pub(crate) fn try_read(&mut self) -> Option<Bytes> {
        match self.rx.try_recv() {
            Ok(chunk) => Some(chunk),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Complete the reading side; pending and future writes fail.
    pub(crate) fn complete(&mut self) { self.rx.close(); }
}
