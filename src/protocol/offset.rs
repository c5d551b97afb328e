//! Request/response shapes for offset management: OffsetFetch (read the
//! group's committed offset), Offset (time-based lookup), OffsetCommit.

use crate::error::KafkaCode;

/// No committed offset exists for a partition; returned by OffsetFetch.
pub const NO_COMMITTED_OFFSET: i64 = -1;

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetFetchRequest {
    pub group_id: String,
    pub partitions: Vec<(String, i32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetFetchPartition {
    pub partition: i32,
    pub offset: i64,
    pub metadata: String,
    pub error_code: KafkaCode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetFetchTopic {
    pub topic_name: String,
    pub partitions: Vec<OffsetFetchPartition>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct OffsetFetchResponse {
    pub topics: Vec<OffsetFetchTopic>,
}

/// A time-based offset lookup request (`time` is `-2` earliest, `-1`
/// latest, or a literal Unix-epoch millisecond timestamp).
#[derive(Clone, Debug, PartialEq)]
pub struct OffsetRequest {
    pub replica_id: i32,
    pub topic_name: String,
    pub partition: i32,
    pub time: i64,
    pub max_offsets: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetResponse {
    pub error_code: KafkaCode,
    pub offsets: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetCommitPartition {
    pub partition: i32,
    pub offset: i64,
    pub metadata: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetCommitTopic {
    pub topic_name: String,
    pub partitions: Vec<OffsetCommitPartition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetCommitRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    /// `-1` requests the broker default retention.
    pub retention_millis: i64,
    pub topics: Vec<OffsetCommitTopic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetCommitPartitionResult {
    pub partition: i32,
    pub error_code: KafkaCode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OffsetCommitTopicResult {
    pub topic_name: String,
    pub partitions: Vec<OffsetCommitPartitionResult>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct OffsetCommitResponse {
    /// Empty is contractually impossible for a well-formed response
    /// covering at least one topic; the fetch/commit loop treats it as
    /// fatal rather than silently doing nothing.
    pub topics: Vec<OffsetCommitTopicResult>,
}
