//! `GenerationState`: the per-membership-epoch state owned exclusively
//! by the Join/Sync Coordinator and observed (never mutated, beyond
//! tripping `closed`) by the heartbeat loop, partition streams, and
//! commit actions attached to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Notify;

use crate::connection::BrokerRef;

/// A single (topic, partition) this member is responsible for within a
/// generation, together with the offset its fetch loop should resume
/// from.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicPartitionAssignment {
    pub topic: String,
    pub partition: i32,
    pub initial_offset: i64,
}

/// A per-generation one-shot latch: initially open, transitions to
/// closed exactly once. `trip` is a compare-and-set so that concurrent
/// closers (heartbeat, any fetch loop, any commit) race harmlessly —
/// only the first caller actually fires the notification.
#[derive(Clone)]
pub struct Closed {
    fired: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Closed {
    pub fn new() -> Self {
        Closed {
            fired: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Fast-path query used by `peek_task`: true once `trip` has been
    /// called by anyone, even if this observer hasn't yet awaited it.
    pub fn is_closed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Trip the latch. Idempotent: only the first caller transitions
    /// open -> closed; later callers are no-ops. Returns whether this
    /// call was the one that fired it.
    pub fn trip(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    /// Resolve once the latch is closed. If it is already closed,
    /// returns immediately.
    pub async fn wait(&self) {
        if self.is_closed() {
            return;
        }
        // Notify::notified() registers for the *next* notification, so
        // re-check after constructing it to avoid missing a trip that
        // raced in between the check above and this call.
        let notified = self.notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// A weak handle used by fire-and-forget cancellation hooks: it must
    /// not keep the generation's `closed` latch (and therefore the
    /// generation's background tasks) alive after the generation itself
    /// has been dropped.
    pub fn downgrade(&self) -> WeakClosed {
        WeakClosed {
            fired: Arc::downgrade(&self.fired),
            notify: Arc::downgrade(&self.notify),
        }
    }
}

/// See [`Closed::downgrade`].
#[derive(Clone)]
pub struct WeakClosed {
    fired: Weak<AtomicBool>,
    notify: Weak<Notify>,
}

impl WeakClosed {
    /// Trips the latch if the generation it belongs to is still alive;
    /// a no-op if it has already been dropped.
    pub fn try_trip(&self) {
        if let (Some(fired), Some(notify)) = (self.fired.upgrade(), self.notify.upgrade()) {
            if fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                notify.notify_waiters();
            }
        }
    }
}

impl Default for Closed {
    fn default() -> Self {
        Closed::new()
    }
}

/// `peek_task(closed, action)`: if `closed` is already set, resolve
/// immediately without running `action`; otherwise run `action` to
/// completion. This is deliberately NOT a race against `closed` — an
/// in-flight broker call always runs to completion once started, which
/// bounds collateral side effects to at most one extra RPC per
/// component per close event.
pub async fn peek_task<F, Fut, T>(closed: &Closed, no_op: T, action: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    if closed.is_closed() {
        return no_op;
    }
    action().await
}

/// One membership epoch in a Kafka consumer group.
pub struct GenerationState {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub leader_id: String,
    /// The broker that served as group coordinator for this generation's
    /// join/sync; reused for heartbeats, commits, and offset fetches
    /// rather than rediscovered per RPC.
    pub coordinator: BrokerRef,
    pub assignments: Vec<TopicPartitionAssignment>,
    pub closed: Closed,
}

impl GenerationState {
    pub fn is_leader(&self) -> bool {
        self.leader_id == self.member_id
    }
}
