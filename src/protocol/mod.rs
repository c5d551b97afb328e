//! In-memory shapes of the Kafka protocol v0 RPCs the generation engine
//! needs. This module defines request/response structures only; encoding
//! them onto the wire and decoding broker replies is an external
//! collaborator's responsibility (see the crate-level docs).

mod fetch;
mod group;
mod message;
mod offset;

pub use self::fetch::{FetchPartition, FetchRequest, FetchResponse, FetchTopic, PartitionData, TopicData};
pub use self::group::{
    GroupAssignment, GroupProtocolMetadata, HeartbeatRequest, HeartbeatResponse, JoinGroupMember,
    JoinGroupProtocol, JoinGroupRequest, JoinGroupResponse, MemberAssignment, SyncGroupRequest,
    SyncGroupResponse, CONSUMER_PROTOCOL_TYPE, RANGE_ASSIGNMENT_STRATEGY,
};
pub use self::message::{Message, MessageSet};
pub use self::offset::{
    OffsetCommitPartition, OffsetCommitPartitionResult, OffsetCommitRequest, OffsetCommitResponse,
    OffsetCommitTopic, OffsetCommitTopicResult, OffsetFetchPartition, OffsetFetchRequest,
    OffsetFetchResponse, OffsetFetchTopic, OffsetRequest, OffsetResponse, NO_COMMITTED_OFFSET,
};
