//! In-memory message socket pair.
//!
//! [`memory_socket_pair`] returns two connected [`MemorySocket`]s. Each keeps
//! message boundaries like a WebSocket: a receive copies at most one
//! message, and the rest of a long message is returned by later receives.
//! A [`SocketControl`] obtained before the socket is handed to a connection
//! can inject faults, split outgoing messages, and inspect what was sent.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use muxframe::{CloseReason, MessageSocket, Received};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

enum Message {
    Data(Bytes),
    Close(CloseReason),
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<Bytes>>,
    send_fault: Mutex<Option<io::ErrorKind>>,
    receive_fault: Mutex<Option<io::ErrorKind>>,
    fault_injected: Notify,
    split_size: AtomicUsize,
    close_sent: Mutex<Option<CloseReason>>,
    close_calls: AtomicUsize,
    close_received: Mutex<Option<CloseReason>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Incoming {
    rx: mpsc::UnboundedReceiver<Message>,
    pending: Bytes,
}

/// One end of an in-memory message socket pair.
pub struct MemorySocket {
    tx: mpsc::UnboundedSender<Message>,
    incoming: AsyncMutex<Incoming>,
    shared: Arc<Shared>,
}

/// Create two connected sockets.
#[must_use]
pub fn memory_socket_pair() -> (MemorySocket, MemorySocket) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (MemorySocket::new(left_tx, left_rx), MemorySocket::new(right_tx, right_rx))
}

impl MemorySocket {
    fn new(tx: mpsc::UnboundedSender<Message>, rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            tx,
            incoming: AsyncMutex::new(Incoming {
                rx,
                pending: Bytes::new(),
            }),
            shared: Arc::default(),
        }
    }

    /// Handle for steering and observing this socket after it has been moved.
    #[must_use]
    pub fn control(&self) -> SocketControl {
        SocketControl {
            shared: self.shared.clone(),
        }
    }

    fn take_fault(slot: &Mutex<Option<io::ErrorKind>>) -> Option<io::Error> {
        lock(slot).take().map(io::Error::from)
    }

    fn deliver(&self, message: Message) -> io::Result<()> {
        self.tx
            .send(message)
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[async_trait]
impl MessageSocket for MemorySocket {
    async fn send(&self, data: Bytes) -> io::Result<()> {
        if let Some(err) = Self::take_fault(&self.shared.send_fault) {
            return Err(err);
        }
        if lock(&self.shared.close_sent).is_some() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "close already sent"));
        }
        let split = self.shared.split_size.load(Ordering::Relaxed);
        let messages = if split == 0 || data.len() <= split {
            vec![data]
        } else {
            data.chunks(split).map(Bytes::copy_from_slice).collect()
        };
        for message in messages {
            lock(&self.shared.sent).push(message.clone());
            self.deliver(Message::Data(message))?;
        }
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<Received> {
        let mut incoming = self.incoming.lock().await;
        loop {
            if let Some(err) = Self::take_fault(&self.shared.receive_fault) {
                return Err(err);
            }
            if !incoming.pending.is_empty() {
                let n = incoming.pending.len().min(buf.len());
                let chunk = incoming.pending.split_to(n);
                buf[..n].copy_from_slice(&chunk);
                return Ok(Received::data(n));
            }
            let next = tokio::select! {
                () = self.shared.fault_injected.notified() => continue,
                next = incoming.rx.recv() => next,
            };
            match next {
                Some(Message::Data(data)) => incoming.pending = data,
                Some(Message::Close(reason)) => {
                    *lock(&self.shared.close_received) = Some(reason);
                    return Ok(Received::close());
                }
                None => return Err(io::Error::from(io::ErrorKind::ConnectionReset)),
            }
        }
    }

    async fn close(&self, reason: CloseReason) -> io::Result<()> {
        self.shared.close_calls.fetch_add(1, Ordering::AcqRel);
        {
            let mut sent = lock(&self.shared.close_sent);
            if sent.is_some() {
                return Ok(());
            }
            *sent = Some(reason);
        }
        // The peer may already be gone; the local side is still closed.
        let _ = self.deliver(Message::Close(reason));
        Ok(())
    }

    fn close_completed(&self) -> bool {
        lock(&self.shared.close_sent).is_some() && lock(&self.shared.close_received).is_some()
    }
}

/// Remote control for a [`MemorySocket`].
#[derive(Clone)]
pub struct SocketControl {
    shared: Arc<Shared>,
}

impl SocketControl {
    /// Make the next `send` fail with `kind`.
    pub fn fail_next_send(&self, kind: io::ErrorKind) { *lock(&self.shared.send_fault) = Some(kind); }

    /// Make the next (or current) `receive` fail with `kind`.
    pub fn fail_next_receive(&self, kind: io::ErrorKind) {
        *lock(&self.shared.receive_fault) = Some(kind);
        self.shared.fault_injected.notify_one();
    }

    /// Deliver each outgoing message in pieces of at most `size` bytes.
    /// Zero disables splitting.
    pub fn split_messages(&self, size: usize) { self.shared.split_size.store(size, Ordering::Relaxed); }

    /// Messages sent so far, in order.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<Bytes> { lock(&self.shared.sent).clone() }

    /// All bytes sent so far, concatenated.
    #[must_use]
    pub fn sent_bytes(&self) -> Bytes {
        let sent = lock(&self.shared.sent);
        let mut buf = BytesMut::with_capacity(sent.iter().map(Bytes::len).sum());
        for message in sent.iter() {
            buf.extend_from_slice(message);
        }
        buf.freeze()
    }

    /// Reason passed to `close`, if this side has closed.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> { *lock(&self.shared.close_sent) }

    /// Number of times `close` was called on this side.
    #[must_use]
    pub fn close_calls(&self) -> usize { self.shared.close_calls.load(Ordering::Acquire) }

    /// Returns `true` once the peer's close frame has been received.
    #[must_use]
    pub fn close_received(&self) -> bool { lock(&self.shared.close_received).is_some() }

    /// Reason carried by the peer's close frame, once received.
    #[must_use]
    pub fn peer_close_reason(&self) -> Option<CloseReason> { *lock(&self.shared.close_received) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn long_messages_span_receives() {
        let (left, right) = memory_socket_pair();
        left.send(Bytes::from_static(b"abcdef")).await.expect("send");

        let mut buf = [0u8; 4];
        assert_eq!(right.receive(&mut buf).await.expect("receive"), Received::data(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(right.receive(&mut buf).await.expect("receive"), Received::data(2));
        assert_eq!(&buf[..2], b"ef");
    }

    #[tokio::test]
    async fn close_handshake_completes_on_both_sides() {
        let (left, right) = memory_socket_pair();
        left.close(CloseReason::Normal).await.expect("close");
        assert!(!left.close_completed());

        let mut buf = [0u8; 4];
        assert_eq!(right.receive(&mut buf).await.expect("receive"), Received::close());
        right.close(CloseReason::Normal).await.expect("close");
        assert_eq!(left.receive(&mut buf).await.expect("receive"), Received::close());

        assert!(left.close_completed());
        assert!(right.close_completed());
        assert_eq!(left.control().close_reason(), Some(CloseReason::Normal));
    }

    #[tokio::test]
    async fn peer_close_reason_is_recorded() {
        let (left, right) = memory_socket_pair();
        let control = right.control();
        left.close(CloseReason::ProtocolError).await.expect("close");
        left.close(CloseReason::Normal).await.expect("second close is a no-op");

        let mut buf = [0u8; 4];
        right.receive(&mut buf).await.expect("receive");
        assert_eq!(control.peer_close_reason(), Some(CloseReason::ProtocolError));
        assert_eq!(left.control().close_calls(), 2);
    }

    #[tokio::test]
    async fn injected_fault_interrupts_waiting_receive() {
        let (left, _right) = memory_socket_pair();
        let control = left.control();
        let waiter = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            left.receive(&mut buf).await
        });
        tokio::task::yield_now().await;
        control.fail_next_receive(io::ErrorKind::ConnectionAborted);

        let err = waiter.await.expect("task panicked").expect_err("fault");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn split_messages_are_tapped_individually() {
        let (left, _right) = memory_socket_pair();
        let control = left.control();
        control.split_messages(2);
        left.send(Bytes::from_static(b"abcde")).await.expect("send");

        assert_eq!(control.sent_messages().len(), 3);
        assert_eq!(control.sent_bytes(), Bytes::from_static(b"abcde"));
    }
}
