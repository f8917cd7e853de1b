//! Table of in-flight requests keyed by [`CorrelationId`].
//!
//! `CorrelationTable` maps each outstanding request to a one-shot outcome slot.
//! Every operation removes the entry atomically before completing its slot, so
//! a slot is written at most once no matter how resolution, cancellation, and
//! teardown race.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

use super::CorrelationId;

/// Final state of a pending request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The peer answered with this payload.
    Response(Bytes),
    /// The request was canceled before a response arrived.
    Canceled,
    /// The connection closed before a response arrived.
    Closed,
}

/// Concurrent map of pending requests, cheap to clone.
#[derive(Clone, Default)]
pub struct CorrelationTable(Arc<DashMap<CorrelationId, oneshot::Sender<Outcome>>>);

impl CorrelationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `id` and return the slot its outcome will be delivered to.
    ///
    /// The entry is removed when the returned [`PendingCall`] is dropped, so an
    /// entry never outlives the call that created it.
    #[must_use]
    pub fn register(&self, id: CorrelationId) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        self.0.insert(id, tx);
        PendingCall {
            id,
            rx,
            table: self.clone(),
        }
    }

    /// Complete the slot for `id` with `payload`.
    ///
    /// Returns `false` when no entry matched; the caller may have been
    /// canceled already or the id may be foreign.
    pub fn resolve(&self, id: &CorrelationId, payload: Bytes) -> bool {
        self.complete(id, Outcome::Response(payload))
    }

    /// Complete the slot for `id` with [`Outcome::Canceled`], if present.
    pub fn cancel(&self, id: &CorrelationId) -> bool { self.complete(id, Outcome::Canceled) }

    /// Complete every remaining slot with [`Outcome::Closed`].
    ///
    /// Returns how many entries were failed. Ids are collected before removal
    /// because iterating holds shard read locks.
    pub fn fail_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.0.iter().map(|entry| *entry.key()).collect();
        ids.iter()
            .filter(|id| self.complete(id, Outcome::Closed))
            .count()
    }

    /// Number of requests currently awaiting an outcome.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when no requests are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns `true` if `id` is still awaiting an outcome.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool { self.0.contains_key(id) }

    fn complete(&self, id: &CorrelationId, outcome: Outcome) -> bool {
        match self.0.remove(id) {
            Some((_, tx)) => {
                // The receiver may be gone if the call was dropped concurrently.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Outcome slot returned by [`CorrelationTable::register`].
///
/// Dropping the slot removes its table entry.
#[must_use = "dropping a PendingCall removes its correlation entry"]
pub struct PendingCall {
    id: CorrelationId,
    rx: oneshot::Receiver<Outcome>,
    table: CorrelationTable,
}

impl PendingCall {
    /// Identifier this slot is registered under.
    #[must_use]
    pub fn id(&self) -> CorrelationId { self.id }

    /// Wait for the outcome.
    ///
    /// A slot whose entry was dropped without an explicit outcome (for example
    /// by [`CorrelationTable::fail_all`]) reports [`Outcome::Closed`].
    pub async fn outcome(&mut self) -> Outcome { (&mut self.rx).await.unwrap_or(Outcome::Closed) }
}

impl Drop for PendingCall {
    fn drop(&mut self) { self.table.0.remove(&self.id); }
}
