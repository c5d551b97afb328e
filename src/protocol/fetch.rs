//! Request/response shapes for the Fetch RPC.

use crate::error::KafkaCode;
use crate::protocol::message::MessageSet;

#[derive(Clone, Debug, PartialEq)]
pub struct FetchPartition {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchTopic {
    pub topic_name: String,
    pub partitions: Vec<FetchPartition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    /// Always `-1` for a consumer fetch (non-replica).
    pub replica_id: i32,
    pub max_wait_millis: i32,
    pub min_bytes: i32,
    pub topics: Vec<FetchTopic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionData {
    pub partition: i32,
    pub error_code: KafkaCode,
    pub high_watermark_offset: i64,
    pub message_set: MessageSet,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TopicData {
    pub topic_name: String,
    pub partitions: Vec<PartitionData>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct FetchResponse {
    /// Contractually non-empty for a request that named at least one
    /// topic; an empty list is a broker protocol violation (fatal).
    pub topics: Vec<TopicData>,
}
