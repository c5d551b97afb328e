//! Request/response shapes for the group-membership RPCs: JoinGroup,
//! SyncGroup, Heartbeat. Metadata and assignment blobs are nested
//! length-prefixed structures at version=0 on the wire; here they are
//! already-decoded values, since encoding is out of scope.

use crate::error::KafkaCode;

pub const CONSUMER_PROTOCOL_TYPE: &str = "consumer";
pub const RANGE_ASSIGNMENT_STRATEGY: &str = "range";

/// Per-protocol metadata a member advertises when joining; carries the
/// topics it wants to consume.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupProtocolMetadata {
    pub version: i16,
    pub topics: Vec<String>,
    pub user_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinGroupProtocol {
    pub protocol_name: String,
    pub metadata: GroupProtocolMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinGroupRequest {
    pub group_id: String,
    pub session_timeout_millis: i32,
    pub member_id: String,
    pub protocol_type: String,
    pub group_protocols: Vec<JoinGroupProtocol>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinGroupMember {
    pub member_id: String,
    pub metadata: GroupProtocolMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinGroupResponse {
    pub error_code: KafkaCode,
    pub generation_id: i32,
    pub group_protocol: String,
    pub leader_id: String,
    pub member_id: String,
    /// Non-empty only for the member elected leader; the leader performs
    /// assignment and the rest of the group sees an empty list.
    pub members: Vec<JoinGroupMember>,
}

impl JoinGroupResponse {
    pub fn is_leader(&self) -> bool {
        !self.members.is_empty()
    }
}

/// Per-member assignment the leader computes and ships in a SyncGroup
/// request; the coordinator relays each member's own entry back to it.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupAssignment {
    pub member_id: String,
    pub assignment: MemberAssignment,
}

/// The decoded assignment payload: topic -> assigned partition ids.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MemberAssignment {
    pub version: i16,
    pub partitions: Vec<(String, Vec<i32>)>,
}

impl MemberAssignment {
    pub fn partition_count(&self) -> usize {
        self.partitions.iter().map(|(_, ps)| ps.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyncGroupRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    /// Present (non-empty) only when sent by the leader; followers send
    /// an empty vector and receive their assignment back regardless.
    pub group_assignment: Vec<GroupAssignment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyncGroupResponse {
    pub error_code: KafkaCode,
    pub member_assignment: MemberAssignment,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeartbeatRequest {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeartbeatResponse {
    pub error_code: KafkaCode,
}
