//! Consumer configuration.

use std::time::Duration;

pub const DEFAULT_SESSION_TIMEOUT_MILLIS: u64 = 20_000;
pub const DEFAULT_HEARTBEAT_FREQUENCY: u32 = 10;
pub const DEFAULT_FETCH_MIN_BYTES: i32 = 0;
pub const DEFAULT_FETCH_MAX_WAIT_MILLIS: u64 = 0;
pub const DEFAULT_FETCH_BUFFER_BYTES: i32 = 1_000_000;
pub const DEFAULT_OFFSET_RETENTION_MILLIS: i64 = -1;
pub const DEFAULT_EMPTY_FETCH_BACKOFF_MILLIS: u64 = 10_000;
pub const DEFAULT_OUT_OF_RANGE_BACKOFF_MILLIS: u64 = 5_000;
pub const DEFAULT_JOIN_RETRY_BACKOFF_MILLIS: u64 = 1_000;

/// Where a partition's fetch should resume when the group has no
/// previously committed offset for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitialFetchTime {
    EarliestOffset,
    LatestOffset,
    /// Resolve the offset of the first record at or after this
    /// Unix-epoch millisecond timestamp.
    Timestamp(i64),
}

impl InitialFetchTime {
    /// The `time` field of an `Offset` request, per the Kafka protocol:
    /// -2 for earliest, -1 for latest, otherwise a literal timestamp.
    pub fn as_wire_time(&self) -> i64 {
        match *self {
            InitialFetchTime::EarliestOffset => -2,
            InitialFetchTime::LatestOffset => -1,
            InitialFetchTime::Timestamp(ts) => ts,
        }
    }
}

impl Default for InitialFetchTime {
    fn default() -> Self {
        InitialFetchTime::EarliestOffset
    }
}

/// Immutable configuration for a single consumer group membership.
///
/// Mirrors the teacher's `consumer::ConsumerConfig`, generalized with the
/// two magic-number backoffs (empty-fetch / out-of-range recovery)
/// promoted to fields per the open question in the design notes.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub topics: Vec<String>,
    pub session_timeout: Duration,
    /// Heartbeats per session timeout; heartbeat interval = session
    /// timeout / heartbeat_frequency.
    pub heartbeat_frequency: u32,
    pub fetch_min_bytes: i32,
    pub fetch_max_wait: Duration,
    pub fetch_buffer_bytes: i32,
    /// `None` requests the broker default retention; `Some(_)` pins an
    /// explicit retention, including `Some(Duration::ZERO)`.
    pub offset_retention: Option<Duration>,
    pub initial_fetch_time: InitialFetchTime,
    pub empty_fetch_backoff: Duration,
    pub out_of_range_backoff: Duration,
    /// Delay before the Generation Engine retries `join()` after a
    /// transport-transient failure discovering the coordinator or
    /// performing the join/sync RPCs themselves.
    pub join_retry_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new<S: Into<String>>(group_id: S, topics: Vec<String>) -> Self {
        ConsumerConfig {
            group_id: group_id.into(),
            topics,
            ..ConsumerConfig::default()
        }
    }

    /// The client-side heartbeat interval: session timeout divided by
    /// the configured heartbeat frequency.
    pub fn heartbeat_interval(&self) -> Duration {
        self.session_timeout / self.heartbeat_frequency.max(1)
    }

    /// The retention value to place on an `OffsetCommit` request; `-1`
    /// signals "use the broker default".
    pub fn offset_retention_millis(&self) -> i64 {
        match self.offset_retention {
            Some(retention) => retention.as_millis() as i64,
            None => DEFAULT_OFFSET_RETENTION_MILLIS,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            group_id: String::new(),
            topics: Vec::new(),
            session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MILLIS),
            heartbeat_frequency: DEFAULT_HEARTBEAT_FREQUENCY,
            fetch_min_bytes: DEFAULT_FETCH_MIN_BYTES,
            fetch_max_wait: Duration::from_millis(DEFAULT_FETCH_MAX_WAIT_MILLIS),
            fetch_buffer_bytes: DEFAULT_FETCH_BUFFER_BYTES,
            offset_retention: None,
            initial_fetch_time: InitialFetchTime::EarliestOffset,
            empty_fetch_backoff: Duration::from_millis(DEFAULT_EMPTY_FETCH_BACKOFF_MILLIS),
            out_of_range_backoff: Duration::from_millis(DEFAULT_OUT_OF_RANGE_BACKOFF_MILLIS),
            join_retry_backoff: Duration::from_millis(DEFAULT_JOIN_RETRY_BACKOFF_MILLIS),
        }
    }
}
