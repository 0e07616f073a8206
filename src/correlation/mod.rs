//! Correlation table: in-flight exchanges keyed by correlation identifier.
//!
//! Each exchange owns exactly one record from registration until it is
//! removed by one of resolution, expiry or cancellation. Removal and
//! delivery happen under the same lock, so a deadline that elapses while
//! a response is being delivered can never report a timeout for an
//! exchange that was already answered.
//!
//! ```text
//! caller ── register ──▶ [table] ◀── resolve ── inbound dispatch
//!    │                      ▲
//!    └── recv (deadline) ───┴── expire
//! ```
//!
//! Single-shot records are removed by the first `resolve`. Multi-round
//! records (paged queries) stay registered for the whole exchange and
//! accept one delivery per armed round; the owning [`Registration`]
//! removes them when dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{BrokerError, Result};

/// Identifier linking an outbound request to its inbound response(s).
pub type CorrelationId = Uuid;

/// Generate a fresh correlation identifier (random 128-bit).
pub fn new_correlation_id() -> CorrelationId {
    Uuid::new_v4()
}

/// What an inbound message delivers to a waiting exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A regular response payload.
    Response(Value),
    /// An explicit error message from the remote side.
    Rejected(Value),
}

/// How long a record stays registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Removed by the first delivery.
    SingleShot,
    /// Stays registered across rounds until the owner finishes it.
    MultiRound,
}

struct PendingRequest {
    /// Sender for the current round; `None` between rounds.
    waiter: Option<oneshot::Sender<Delivery>>,
    deadline: Instant,
    lifetime: Lifetime,
}

/// Identifier-keyed registry of in-flight exchanges.
pub struct CorrelationTable {
    /// Label for logs ("query", "command").
    kind: &'static str,
    pending: Mutex<HashMap<CorrelationId, PendingRequest>>,
}

impl CorrelationTable {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingRequest>> {
        // No operation panics while holding the lock; recover the map if one did.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new exchange with its first round armed.
    ///
    /// Fails with `DuplicateCorrelation` rather than overwriting a caller.
    pub fn register(
        &self,
        id: CorrelationId,
        deadline: Instant,
        lifetime: Lifetime,
    ) -> Result<Registration<'_>> {
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.lock();
            if pending.contains_key(&id) {
                error!(kind = self.kind, correlation_id = %id, "Duplicate correlation id");
                return Err(BrokerError::DuplicateCorrelation(id));
            }
            pending.insert(
                id,
                PendingRequest {
                    waiter: Some(sender),
                    deadline,
                    lifetime,
                },
            );
        }

        debug!(kind = self.kind, correlation_id = %id, ?lifetime, "Exchange registered");

        Ok(Registration {
            table: self,
            id,
            deadline,
            receiver: Some(receiver),
        })
    }

    /// Deliver an inbound message to the exchange waiting on `id`.
    ///
    /// Returns `false` when no armed record exists; late, duplicate and
    /// unsolicited messages are dropped here.
    pub fn resolve(&self, id: &CorrelationId, delivery: Delivery) -> bool {
        // Send under the lock: an expiry either sees the record gone and a
        // delivery waiting, or removes the record before it is resolved.
        let mut pending = self.lock();
        let lifetime = match pending.get(id) {
            Some(record) => record.lifetime,
            None => {
                debug!(kind = self.kind, correlation_id = %id, "No pending exchange, dropping message");
                return false;
            }
        };
        let sender = match lifetime {
            Lifetime::SingleShot => pending.remove(id).and_then(|record| record.waiter),
            Lifetime::MultiRound => pending.get_mut(id).and_then(|record| record.waiter.take()),
        };

        match sender {
            Some(sender) => {
                if sender.send(delivery).is_err() {
                    debug!(kind = self.kind, correlation_id = %id, "Caller stopped waiting");
                    return false;
                }
                true
            }
            None => {
                debug!(kind = self.kind, correlation_id = %id, "No round armed, dropping message");
                false
            }
        }
    }

    /// Remove an exchange whose deadline elapsed.
    ///
    /// Returns `false` if the record was already removed by another path.
    pub fn expire(&self, id: &CorrelationId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!(kind = self.kind, correlation_id = %id, "Exchange expired");
        }
        removed
    }

    /// Remove an exchange explicitly (finished, abandoned or failed to publish).
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Arm the next round of a multi-round exchange.
    fn rearm(&self, id: &CorrelationId) -> Option<oneshot::Receiver<Delivery>> {
        let mut pending = self.lock();
        let record = pending.get_mut(id)?;
        let (sender, receiver) = oneshot::channel();
        record.waiter = Some(sender);
        Some(receiver)
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.lock().contains_key(id)
    }

    /// Deadline of a pending exchange.
    pub fn deadline(&self, id: &CorrelationId) -> Option<Instant> {
        self.lock().get(id).map(|record| record.deadline)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Caller-side handle of one registered exchange.
///
/// Dropping it removes the record, so an abandoned or failed exchange
/// never leaks an entry.
pub struct Registration<'a> {
    table: &'a CorrelationTable,
    id: CorrelationId,
    deadline: Instant,
    receiver: Option<oneshot::Receiver<Delivery>>,
}

impl Registration<'_> {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the armed round's delivery until the exchange deadline.
    ///
    /// Returns `None` when the deadline elapsed first.
    pub async fn recv(&mut self) -> Option<Delivery> {
        let mut receiver = self.receiver.take()?;

        match tokio::time::timeout_at(self.deadline, &mut receiver).await {
            Ok(Ok(delivery)) => Some(delivery),
            // Sender dropped: the record was removed by another path.
            Ok(Err(_)) => None,
            Err(_) => {
                if let Ok(delivery) = receiver.try_recv() {
                    return Some(delivery);
                }
                if self.table.expire(&self.id) {
                    return None;
                }
                // Resolved between the deadline and the expiry lock.
                receiver.try_recv().ok()
            }
        }
    }

    /// Arm the next round. Returns `false` once the record is gone.
    pub fn rearm(&mut self) -> bool {
        match self.table.rearm(&self.id) {
            Some(receiver) => {
                self.receiver = Some(receiver);
                true
            }
            None => false,
        }
    }

    /// Remove the record after the exchange completed.
    pub fn finish(self) {
        // Drop does the removal.
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.table.cancel(&self.id) {
            debug!(kind = self.table.kind, correlation_id = %self.id, "Exchange removed");
        }
    }
}
