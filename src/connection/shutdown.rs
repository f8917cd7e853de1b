//! Lifecycle coordinator.
//!
//! Loops never tear the connection down themselves. Each posts a
//! [`ShutdownRequest`] when it exits, as does [`super::Connection::dispose`],
//! and a single coordinator task runs the teardown sequence once, for the
//! first request it receives.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{ConnectionId, counter::ActiveConnection, state::StateCell};
use crate::{
    correlation::CorrelationTable,
    error::{MuxError, Termination},
    metrics,
    socket::{CloseReason, MessageSocket},
};

/// The long-lived tasks driving a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LoopKind {
    Serializer,
    Transmit,
    Receive,
    Demultiplexer,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serializer => "serializer",
            Self::Transmit => "transmit",
            Self::Receive => "receive",
            Self::Demultiplexer => "demultiplexer",
        })
    }
}

/// Reason for posting to the coordinator.
pub(super) enum ShutdownRequest {
    /// Local teardown request.
    Dispose,
    /// A loop finished, cleanly or with a fatal error.
    LoopExited {
        kind: LoopKind,
        result: Result<(), MuxError>,
    },
}

impl ShutdownRequest {
    fn close_reason(&self) -> CloseReason {
        match self {
            Self::LoopExited {
                result: Err(MuxError::ProtocolViolation(_)),
                ..
            } => CloseReason::ProtocolError,
            Self::LoopExited { result: Err(_), .. } => CloseReason::InternalError,
            Self::Dispose | Self::LoopExited { result: Ok(()), .. } => CloseReason::Normal,
        }
    }
}

impl fmt::Display for ShutdownRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispose => f.write_str("dispose"),
            Self::LoopExited { kind, result: Ok(()) } => write!(f, "{kind} loop ended"),
            Self::LoopExited {
                kind,
                result: Err(e),
            } => write!(f, "{kind} loop failed: {e}"),
        }
    }
}

/// Cloneable sender posting to the coordinator.
#[derive(Clone)]
pub(super) struct ShutdownHandle {
    tx: mpsc::UnboundedSender<ShutdownRequest>,
}

impl ShutdownHandle {
    pub(super) fn new() -> (Self, mpsc::UnboundedReceiver<ShutdownRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post a request. Requests arriving after teardown are discarded.
    pub(super) fn request(&self, request: ShutdownRequest) { let _ = self.tx.send(request); }

    /// Spawn `task` on `tracker`, posting its outcome when it returns.
    pub(super) fn spawn_loop<F>(&self, tracker: &TaskTracker, kind: LoopKind, task: F)
    where
        F: Future<Output = Result<(), MuxError>> + Send + 'static,
    {
        let handle = self.clone();
        tracker.spawn(async move {
            let result = task.await;
            tracing::debug!(loop_kind = %kind, ok = result.is_ok(), "connection loop exited");
            handle.request(ShutdownRequest::LoopExited { kind, result });
        });
    }
}

/// Runs the teardown sequence exactly once.
pub(super) struct Coordinator {
    pub(super) id: ConnectionId,
    pub(super) requests: mpsc::UnboundedReceiver<ShutdownRequest>,
    pub(super) socket: Option<Arc<dyn MessageSocket>>,
    pub(super) shutdown: CancellationToken,
    pub(super) tracker: TaskTracker,
    pub(super) table: CorrelationTable,
    pub(super) state: Arc<StateCell>,
    pub(super) completion: watch::Sender<Option<Termination>>,
    pub(super) close_timeout: Duration,
    pub(super) counter: Option<ActiveConnection>,
}

impl Coordinator {
    /// Wait for the first shutdown request, then tear down.
    ///
    /// Sequence: enter `Closing`, cancel the loops, close the socket unless
    /// its handshake already completed, release it, wait for every loop,
    /// fail outstanding calls, enter `Closed`, publish the termination.
    pub(super) async fn run(mut self) {
        let first = self
            .requests
            .recv()
            .await
            .unwrap_or(ShutdownRequest::Dispose);
        self.state.begin_closing();
        info!("connection closing: id={}, trigger={first}", self.id);
        self.shutdown.cancel();

        if let Some(socket) = self.socket.take() {
            self.close_socket(socket.as_ref(), first.close_reason()).await;
        }

        let exits = self.await_loops(first).await;
        let termination = Self::termination(self.id, exits);

        let failed = self.table.fail_all();
        if failed > 0 {
            info!(
                "failed pending requests on close: id={}, count={failed}",
                self.id
            );
        }
        self.state.finish();
        drop(self.counter.take());
        info!(
            "connection closed: id={}, termination={termination}, muxframe_active_connections={}",
            self.id,
            super::active_connection_count()
        );
        self.completion.send_replace(Some(termination));
    }

    async fn close_socket(&self, socket: &dyn MessageSocket, reason: CloseReason) {
        if socket.close_completed() {
            return;
        }
        match tokio::time::timeout(self.close_timeout, socket.close(reason)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("close handshake failed: id={}, error={e}", self.id),
            Err(_) => warn!(
                "close handshake timed out: id={}, timeout={:?}",
                self.id, self.close_timeout
            ),
        }
    }

    /// Wait for every loop to finish, collecting the requests posted
    /// meanwhile.
    async fn await_loops(&mut self, first: ShutdownRequest) -> Vec<ShutdownRequest> {
        let mut exits = vec![first];
        self.tracker.close();
        let finished = self.tracker.wait();
        tokio::pin!(finished);
        loop {
            tokio::select! {
                biased;

                () = &mut finished => break,
                Some(request) = self.requests.recv() => exits.push(request),
            }
        }
        while let Ok(request) = self.requests.try_recv() {
            exits.push(request);
        }
        exits
    }

    /// Dispose wins if it came first; otherwise the first fatal error, if any.
    fn termination(id: ConnectionId, exits: Vec<ShutdownRequest>) -> Termination {
        let disposed = matches!(exits.first(), Some(ShutdownRequest::Dispose));
        let mut failure = None;
        for exit in exits {
            if let ShutdownRequest::LoopExited {
                kind,
                result: Err(e),
            } = exit
            {
                warn!("connection loop failed: id={id}, loop={kind}, error={e}");
                metrics::inc_errors(e.kind());
                failure.get_or_insert(e);
            }
        }
        match failure {
            _ if disposed => Termination::Disposed,
            Some(e) => Termination::Failed(Arc::new(e)),
            None => Termination::PeerClosed,
        }
    }
}
