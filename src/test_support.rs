//! A fake `KafkaConnection` used by unit tests throughout the crate. Not
//! part of the public API; scripted replies let each component be tested
//! in isolation from the wire codec and broker pool (both out of scope
//! for this crate).

#![cfg(test)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::connection::{BrokerRef, CancellationToken, KafkaConnection};
use crate::error::{Error, KafkaCode, Result};
use crate::protocol::*;

#[derive(Default)]
struct Scripted {
    join_group: Vec<JoinGroupResponse>,
    sync_group: Vec<SyncGroupResponse>,
    heartbeat: Vec<HeartbeatResponse>,
    offset_fetch: Vec<OffsetFetchResponse>,
    offset: Vec<OffsetResponse>,
    offset_commit: Vec<OffsetCommitResponse>,
    fetch: Vec<FetchResponse>,
    metadata: HashMap<String, Vec<i32>>,
}

/// Records every request it receives and replays scripted responses in
/// FIFO order per RPC kind (repeating the last one once exhausted, so
/// tests don't need to script every call of a loop that runs more than
/// once).
pub struct FakeConnection {
    scripted: Mutex<Scripted>,
    cancellation: CancellationToken,

    pub join_group_calls: AtomicUsize,
    pub sync_group_calls: AtomicUsize,
    pub heartbeat_calls: AtomicUsize,
    pub offset_fetch_calls: AtomicUsize,
    pub offset_calls: AtomicUsize,
    pub offset_commit_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub reconnect_calls: AtomicUsize,

    pub coordinator_name: Mutex<String>,
    last_join_group_req: Mutex<Option<JoinGroupRequest>>,
    last_sync_group_req: Mutex<Option<SyncGroupRequest>>,
    last_fetch_req: Mutex<Option<FetchRequest>>,
    last_commit_req: Mutex<Option<OffsetCommitRequest>>,

    generation_counter: AtomicI32,
    /// Remaining number of `group_coordinator` calls to fail with a
    /// transport error before responding normally.
    fail_group_coordinator: AtomicUsize,
}

impl FakeConnection {
    pub fn new() -> Self {
        FakeConnection {
            scripted: Mutex::new(Scripted::default()),
            cancellation: CancellationToken::new(),
            join_group_calls: AtomicUsize::new(0),
            sync_group_calls: AtomicUsize::new(0),
            heartbeat_calls: AtomicUsize::new(0),
            offset_fetch_calls: AtomicUsize::new(0),
            offset_calls: AtomicUsize::new(0),
            offset_commit_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            reconnect_calls: AtomicUsize::new(0),
            coordinator_name: Mutex::new("broker-1".to_string()),
            last_join_group_req: Mutex::new(None),
            last_sync_group_req: Mutex::new(None),
            last_fetch_req: Mutex::new(None),
            last_commit_req: Mutex::new(None),
            generation_counter: AtomicI32::new(1),
            fail_group_coordinator: AtomicUsize::new(0),
        }
    }

    /// The next `count` calls to `group_coordinator` return a transport
    /// error instead of a scripted coordinator.
    pub fn fail_group_coordinator_times(&self, count: usize) {
        self.fail_group_coordinator.store(count, Ordering::SeqCst);
    }

    pub fn set_offset_fetch_reply(&self, topic: &str, partition: i32, offset: i64, error_code: KafkaCode) {
        self.scripted.lock().unwrap().offset_fetch.push(OffsetFetchResponse {
            topics: vec![OffsetFetchTopic {
                topic_name: topic.to_string(),
                partitions: vec![OffsetFetchPartition {
                    partition,
                    offset,
                    metadata: String::new(),
                    error_code,
                }],
            }],
        });
    }

    pub fn set_offset_reply(&self, offset: i64) {
        self.scripted.lock().unwrap().offset.push(OffsetResponse {
            error_code: KafkaCode::None,
            offsets: vec![offset],
        });
    }

    pub fn push_join_group_reply(&self, resp: JoinGroupResponse) {
        self.scripted.lock().unwrap().join_group.push(resp);
    }

    pub fn push_sync_group_reply(&self, resp: SyncGroupResponse) {
        self.scripted.lock().unwrap().sync_group.push(resp);
    }

    pub fn push_heartbeat_reply(&self, resp: HeartbeatResponse) {
        self.scripted.lock().unwrap().heartbeat.push(resp);
    }

    pub fn push_fetch_reply(&self, resp: FetchResponse) {
        self.scripted.lock().unwrap().fetch.push(resp);
    }

    pub fn push_offset_commit_reply(&self, resp: OffsetCommitResponse) {
        self.scripted.lock().unwrap().offset_commit.push(resp);
    }

    pub fn set_metadata(&self, topic: &str, partitions: Vec<i32>) {
        self.scripted
            .lock()
            .unwrap()
            .metadata
            .insert(topic.to_string(), partitions);
    }

    pub fn last_join_group_request(&self) -> Option<JoinGroupRequest> {
        self.last_join_group_req.lock().unwrap().clone()
    }

    pub fn last_sync_group_request(&self) -> Option<SyncGroupRequest> {
        self.last_sync_group_req.lock().unwrap().clone()
    }

    pub fn last_fetch_request(&self) -> Option<FetchRequest> {
        self.last_fetch_req.lock().unwrap().clone()
    }

    pub fn last_commit_request(&self) -> Option<OffsetCommitRequest> {
        self.last_commit_req.lock().unwrap().clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn take<T: Clone>(list: &mut Vec<T>) -> T
    where
        T: Clone,
    {
        if list.len() > 1 {
            list.remove(0)
        } else {
            list.last().expect("no scripted response pushed").clone()
        }
    }
}

impl Default for FakeConnection {
    fn default() -> Self {
        FakeConnection::new()
    }
}

#[async_trait]
impl KafkaConnection for FakeConnection {
    async fn group_coordinator(&self, _group_id: &str) -> Result<BrokerRef> {
        let remaining = self.fail_group_coordinator.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_group_coordinator.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Transport(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        }
        Ok(BrokerRef(self.coordinator_name.lock().unwrap().clone()))
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn join_group(&self, _coordinator: &BrokerRef, req: JoinGroupRequest) -> Result<JoinGroupResponse> {
        self.join_group_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_join_group_req.lock().unwrap() = Some(req);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.join_group))
    }

    async fn sync_group(&self, _coordinator: &BrokerRef, req: SyncGroupRequest) -> Result<SyncGroupResponse> {
        self.sync_group_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sync_group_req.lock().unwrap() = Some(req);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.sync_group))
    }

    async fn heartbeat(&self, _coordinator: &BrokerRef, _req: HeartbeatRequest) -> Result<HeartbeatResponse> {
        self.heartbeat_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.heartbeat))
    }

    async fn offset_fetch(&self, _coordinator: &BrokerRef, _req: OffsetFetchRequest) -> Result<OffsetFetchResponse> {
        self.offset_fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.offset_fetch))
    }

    async fn offset(&self, _req: OffsetRequest) -> Result<OffsetResponse> {
        self.offset_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.offset))
    }

    async fn offset_commit(&self, _coordinator: &BrokerRef, req: OffsetCommitRequest) -> Result<OffsetCommitResponse> {
        self.offset_commit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_commit_req.lock().unwrap() = Some(req);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.offset_commit))
    }

    async fn fetch(&self, req: FetchRequest) -> Result<FetchResponse> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch_req.lock().unwrap() = Some(req);
        let mut scripted = self.scripted.lock().unwrap();
        Ok(Self::take(&mut scripted.fetch))
    }

    async fn metadata(&self, topics: &[String]) -> Result<HashMap<String, Vec<i32>>> {
        let scripted = self.scripted.lock().unwrap();
        Ok(topics
            .iter()
            .filter_map(|t| scripted.metadata.get(t).map(|ps| (t.clone(), ps.clone())))
            .collect())
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

pub fn next_generation_id(fake: &FakeConnection) -> i32 {
    fake.generation_counter.fetch_add(1, Ordering::SeqCst)
}
