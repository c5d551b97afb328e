//! The external interface this crate is generic over: an established
//! connection to a Kafka cluster. Broker discovery, wire encoding, TLS,
//! retries and metadata caching live on the other side of this trait and
//! are out of scope here (see the crate-level docs).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::Result;
use crate::protocol::{
    FetchRequest, FetchResponse, HeartbeatRequest, HeartbeatResponse, JoinGroupRequest,
    JoinGroupResponse, OffsetCommitRequest, OffsetCommitResponse, OffsetFetchRequest,
    OffsetFetchResponse, OffsetRequest, OffsetResponse, SyncGroupRequest, SyncGroupResponse,
};

/// Opaque reference to the broker currently acting as group coordinator.
/// Resolved by `KafkaConnection::group_coordinator` and threaded through
/// subsequent group RPCs by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerRef(pub String);

/// A one-shot signal the connection layer exposes: when it fires, every
/// outstanding generation must close. Registration is fire-and-forget —
/// nothing unregisters a hook, since the token fires at most once for
/// the lifetime of the connection.
#[derive(Clone)]
pub struct CancellationToken {
    fired: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken {
            fired: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.fired.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Fast-path query: true once `cancel` has been called, even if this
    /// observer hasn't (or will never) await `cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        CancellationToken::new()
    }
}

/// Everything the generation lifecycle engine needs from a live
/// connection to a Kafka cluster. An implementation is expected to
/// handle the wire codec, the broker connection pool, and
/// group-coordinator discovery; this crate only calls these methods and
/// classifies their outcomes.
#[async_trait]
pub trait KafkaConnection: Send + Sync {
    /// Discover the current coordinator for the given group.
    async fn group_coordinator(&self, group_id: &str) -> Result<BrokerRef>;

    /// Force a reconnect of all broker channels; called by the Join/Sync
    /// Coordinator before rejoining after a prior membership, in case the
    /// previous coordinator is dead.
    async fn reconnect(&self) -> Result<()>;

    async fn join_group(&self, coordinator: &BrokerRef, req: JoinGroupRequest) -> Result<JoinGroupResponse>;

    async fn sync_group(&self, coordinator: &BrokerRef, req: SyncGroupRequest) -> Result<SyncGroupResponse>;

    async fn heartbeat(&self, coordinator: &BrokerRef, req: HeartbeatRequest) -> Result<HeartbeatResponse>;

    async fn offset_fetch(&self, coordinator: &BrokerRef, req: OffsetFetchRequest) -> Result<OffsetFetchResponse>;

    async fn offset(&self, req: OffsetRequest) -> Result<OffsetResponse>;

    async fn offset_commit(&self, coordinator: &BrokerRef, req: OffsetCommitRequest) -> Result<OffsetCommitResponse>;

    async fn fetch(&self, req: FetchRequest) -> Result<FetchResponse>;

    /// Metadata for the given topics, as (topic, partition id) pairs in
    /// the metadata's natural order.
    async fn metadata(&self, topics: &[String]) -> Result<HashMap<String, Vec<i32>>>;

    /// The connection-wide cancellation token; fires once, when the
    /// connection itself is being torn down.
    fn cancellation(&self) -> CancellationToken;
}
