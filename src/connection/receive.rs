//! Receive loop: socket to inbound pipe.

use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::ConnectionId;
use crate::{error::MuxError, pipe::PipeWriter, socket::MessageSocket};

/// Commit every physical receive from `socket` to `output`.
///
/// Ends cleanly on the peer's close frame, on shutdown, or when the
/// demultiplexer stops reading; a failed receive ends it with
/// [`MuxError::TransportFailure`]. Dropping `output` on exit completes the
/// inbound stream's producer side.
pub(super) async fn run(
    id: ConnectionId,
    socket: Arc<dyn MessageSocket>,
    output: PipeWriter,
    buffer_size: usize,
    shutdown: CancellationToken,
) -> Result<(), MuxError> {
    let mut buf = BytesMut::with_capacity(buffer_size);
    loop {
        buf.resize(buffer_size, 0);
        let received = tokio::select! {
            biased;

            () = shutdown.cancelled() => return Ok(()),
            received = socket.receive(&mut buf) => received?,
        };
        if received.close {
            info!("peer sent close frame: id={id}");
            return Ok(());
        }
        buf.truncate(received.len.min(buffer_size));
        let chunk = buf.split().freeze();
        let committed = tokio::select! {
            biased;

            () = shutdown.cancelled() => return Ok(()),
            committed = output.write(chunk) => committed,
        };
        if committed.is_err() {
            debug!("inbound pipe completed; receive loop stopping: id={id}");
            return Ok(());
        }
    }
}
