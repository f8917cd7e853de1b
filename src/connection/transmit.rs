//! Transmit loop: outbound pipe to socket.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::{error::MuxError, pipe::PipeReader, socket::MessageSocket};

/// Send every chunk read from `input` on `socket`, preserving order.
///
/// Chunks already buffered when a send starts are coalesced into that send.
/// Ends cleanly when the pipe completes or `shutdown` fires; a failed send
/// ends it with [`MuxError::TransportFailure`]. The pipe is completed on
/// every exit path.
pub(super) async fn run(
    socket: Arc<dyn MessageSocket>,
    mut input: PipeReader,
    shutdown: CancellationToken,
) -> Result<(), MuxError> {
    let result = loop {
        let chunk = tokio::select! {
            biased;

            () = shutdown.cancelled() => break Ok(()),
            chunk = input.read() => match chunk {
                Some(chunk) => chunk,
                None => break Ok(()),
            },
        };
        let data = coalesce(chunk, &mut input);
        let sent = tokio::select! {
            biased;

            () = shutdown.cancelled() => break Ok(()),
            sent = socket.send(data) => sent,
        };
        if let Err(e) = sent {
            break Err(MuxError::TransportFailure(e));
        }
    };
    input.complete();
    debug!("transmit loop finished: ok={}", result.is_ok());
    result
}

fn coalesce(first: Bytes, input: &mut PipeReader) -> Bytes {
    let Some(second) = input.try_read() else {
        return first;
    };
    let mut buf = BytesMut::with_capacity(first.len() + second.len());
    buf.extend_from_slice(&first);
    buf.extend_from_slice(&second);
    while let Some(next) = input.try_read() {
        buf.extend_from_slice(&next);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::{
        pipe::pipe,
        socket::{CloseReason, Received},
    };

    #[derive(Default)]
    struct RecordingSocket {
        sent: Mutex<Vec<Bytes>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageSocket for RecordingSocket {
        async fn send(&self, data: Bytes) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::from(io::ErrorKind::ConnectionReset));
            }
            self.sent.lock().await.push(data);
            Ok(())
        }

        async fn receive(&self, _buf: &mut [u8]) -> io::Result<Received> { Ok(Received::close()) }

        async fn close(&self, _reason: CloseReason) -> io::Result<()> { Ok(()) }

        fn close_completed(&self) -> bool { false }
    }

    #[tokio::test]
    async fn buffered_chunks_share_one_send() {
        let socket = Arc::new(RecordingSocket::default());
        let (writer, reader) = pipe(8);
        for chunk in [&b"ab"[..], b"cd", b"ef"] {
            writer.write(Bytes::from_static(chunk)).await.expect("write");
        }
        drop(writer);

        run(socket.clone(), reader, CancellationToken::new())
            .await
            .expect("clean exit");
        assert_eq!(*socket.sent.lock().await, vec![Bytes::from_static(b"abcdef")]);
    }

    #[tokio::test]
    async fn send_failure_is_fatal_and_completes_pipe() {
        let socket = Arc::new(RecordingSocket {
            fail: true,
            ..RecordingSocket::default()
        });
        let (writer, reader) = pipe(1);
        writer.write(Bytes::from_static(b"x")).await.expect("write");

        let err = run(socket, reader, CancellationToken::new())
            .await
            .expect_err("send failure");
        assert!(matches!(err, MuxError::TransportFailure(_)));
        assert!(writer.write(Bytes::from_static(b"y")).await.is_err());
    }
}
