// In-flight registry — coalesces concurrent sessions onto one fetch per content key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::key::ContentKey;
use crate::error::FetchError;

pub type SessionId = u64;

/// Terminal result of a fetch as seen by waiters. `Ok` means the bytes are
/// durable in the disk cache.
pub type FetchOutcome = Result<(), FetchError>;

struct InFlightEntry {
    owner: SessionId,
    waiters: Vec<SessionId>,
    outcome_tx: watch::Sender<Option<FetchOutcome>>,
}

/// Result of [`InFlightRegistry::try_begin_or_join`].
pub enum Admission {
    /// Caller owns the fetch and must finish it through the lease.
    Begin(FetchLease),
    /// Another session is already fetching; wait on the subscription.
    Joined(Subscription),
}

/// Process-wide map from content key to the sessions waiting on its fetch.
///
/// Constructed once per loader and shared by every session it runs; there is
/// no teardown. All mutation happens under one short critical section.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<ContentKey, InFlightEntry>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically begin a fetch for `key`, or join the one already running.
    pub fn try_begin_or_join(self: &Arc<Self>, key: &ContentKey, session: SessionId) -> Admission {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(key) {
            entry.waiters.push(session);
            debug!(
                "session {} joined fetch for key={} owner={} waiters={}",
                session,
                key,
                entry.owner,
                entry.waiters.len()
            );
            return Admission::Joined(Subscription {
                registry: Arc::clone(self),
                key: key.clone(),
                session,
                outcome_rx: entry.outcome_tx.subscribe(),
                waiting: true,
            });
        }

        let (outcome_tx, _) = watch::channel(None);
        entries.insert(
            key.clone(),
            InFlightEntry {
                owner: session,
                waiters: vec![session],
                outcome_tx,
            },
        );
        debug!("session {} began fetch for key={}", session, key);

        Admission::Begin(FetchLease {
            registry: Arc::clone(self),
            key: key.clone(),
            owner: session,
            completed: false,
        })
    }

    /// Remove the entry and publish `outcome` to every subscriber. Returns the
    /// full waiter list, owner included. Only the owner's lease calls this.
    fn complete(&self, key: &ContentKey, owner: SessionId, outcome: FetchOutcome) -> Vec<SessionId> {
        let entry = {
            let mut entries = self.entries.lock();
            let is_owner = entries.get(key).is_some_and(|entry| entry.owner == owner);
            if is_owner {
                entries.remove(key)
            } else {
                None
            }
        };

        match entry {
            Some(entry) => {
                entry.outcome_tx.send_replace(Some(outcome));
                entry.waiters
            }
            None => {
                warn!("complete for key={} by non-owner session {}", key, owner);
                Vec::new()
            }
        }
    }

    /// Drop a joined session from the waiter list. The fetch keeps running.
    pub fn leave(&self, key: &ContentKey, session: SessionId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if entry.owner == session {
            return false;
        }
        let before = entry.waiters.len();
        entry.waiters.retain(|id| *id != session);
        entry.waiters.len() != before
    }

    pub fn is_in_flight(&self, key: &ContentKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Sessions currently waiting on `key`, owner first.
    pub fn waiters(&self, key: &ContentKey) -> Vec<SessionId> {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.waiters.clone())
            .unwrap_or_default()
    }

    /// Number of keys with a fetch in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Ownership of an in-flight fetch.
///
/// Dropping a lease without calling [`FetchLease::complete`] completes it with
/// [`FetchError::Cancelled`], so an owner that is cancelled or aborted never
/// leaves its waiters hanging.
pub struct FetchLease {
    registry: Arc<InFlightRegistry>,
    key: ContentKey,
    owner: SessionId,
    completed: bool,
}

impl FetchLease {
    pub fn key(&self) -> &ContentKey {
        &self.key
    }

    /// Finish the fetch and fan `outcome` out to every waiter.
    pub fn complete(mut self, outcome: FetchOutcome) -> Vec<SessionId> {
        self.completed = true;
        self.registry.complete(&self.key, self.owner, outcome)
    }
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                "fetch lease for key={} dropped by session {} without completing",
                self.key, self.owner
            );
            self.registry
                .complete(&self.key, self.owner, Err(FetchError::Cancelled));
        }
    }
}

/// A joined session's view of someone else's fetch.
///
/// Dropping a subscription before the outcome arrives leaves the waiter list,
/// same as [`Subscription::leave`].
pub struct Subscription {
    registry: Arc<InFlightRegistry>,
    key: ContentKey,
    session: SessionId,
    outcome_rx: watch::Receiver<Option<FetchOutcome>>,
    waiting: bool,
}

impl Subscription {
    /// Wait for the owner to complete the fetch.
    pub async fn wait(&mut self) -> FetchOutcome {
        loop {
            if let Some(outcome) = self.outcome_rx.borrow_and_update().clone() {
                self.waiting = false;
                return outcome;
            }
            if self.outcome_rx.changed().await.is_err() {
                // Sender gone: the value, if any, was published before the drop.
                self.waiting = false;
                return self
                    .outcome_rx
                    .borrow()
                    .clone()
                    .unwrap_or(Err(FetchError::Cancelled));
            }
        }
    }

    /// Stop waiting. The owner's fetch is unaffected.
    pub fn leave(mut self) -> bool {
        self.waiting = false;
        self.registry.leave(&self.key, self.session)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.waiting {
            debug!(
                "subscription for key={} dropped by session {} while waiting",
                self.key, self.session
            );
            self.registry.leave(&self.key, self.session);
        }
    }
}
