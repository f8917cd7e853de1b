//! Externally observable completion signal.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{MuxError, Termination};

/// Resolves once a connection has finished tearing down.
///
/// Any number of clones may wait concurrently; all observe the same
/// [`Termination`].
#[derive(Clone, Debug)]
pub struct Completion {
    rx: watch::Receiver<Option<Termination>>,
}

impl Completion {
    pub(super) fn channel() -> (watch::Sender<Option<Termination>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    /// Wait for teardown to finish.
    ///
    /// If the coordinator disappears without publishing (for example because
    /// the runtime shut down), the connection is reported as failed with
    /// [`MuxError::ConnectionClosed`].
    pub async fn wait(&self) -> Termination {
        let mut rx = self.rx.clone();
        let published = rx.wait_for(Option::is_some).await.map(|value| (*value).clone());
        match published {
            Ok(Some(termination)) => termination,
            Ok(None) | Err(_) => Termination::Failed(Arc::new(MuxError::ConnectionClosed)),
        }
    }

    /// The termination, if teardown has already finished.
    #[must_use]
    pub fn peek(&self) -> Option<Termination> { self.rx.borrow().clone() }

    /// Returns `true` once teardown has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.rx.borrow().is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_waiters_observe_the_same_termination() {
        let (tx, completion) = Completion::channel();
        let other = completion.clone();
        assert!(completion.peek().is_none());

        let waiter = tokio::spawn(async move { other.wait().await });
        tx.send_replace(Some(Termination::PeerClosed));

        assert!(matches!(waiter.await.expect("waiter panicked"), Termination::PeerClosed));
        assert!(matches!(completion.wait().await, Termination::PeerClosed));
        assert!(completion.is_complete());
    }

    #[tokio::test]
    async fn dropped_sender_reports_failure() {
        let (tx, completion) = Completion::channel();
        drop(tx);
        let termination = completion.wait().await;
        assert!(matches!(termination.error(), Some(MuxError::ConnectionClosed)));
    }
}
