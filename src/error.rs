//! Kafka broker error codes and the classifier that turns them into the
//! generation-lifecycle actions the rest of the crate reacts to.

use std::io;

/// Various errors reported by a remote Kafka server.
///
/// We use numeric codes to indicate what problem occurred on the server.
/// These can be translated by the client into exceptions or whatever the
/// appropriate error handling mechanism in the client language is.
///
/// See also [Kafka Errors](http://kafka.apache.org/protocol.html)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i16)]
pub enum KafkaCode {
    /// The server experienced an unexpected error when processing the request.
    Unknown = -1,
    None = 0,
    /// The requested offset is outside the range of offsets maintained by
    /// the server for the given topic/partition.
    OffsetOutOfRange = 1,
    /// This indicates that a message's contents do not match its CRC.
    CorruptMessage = 2,
    /// This request is for a topic or partition that does not exist on
    /// this broker.
    UnknownTopicOrPartition = 3,
    /// The message has a negative size.
    InvalidMessageSize = 4,
    /// Thrown if we are in the middle of a leadership election and there
    /// is currently no leader for this partition.
    LeaderNotAvailable = 5,
    /// Thrown if the client attempts to send messages to a replica that
    /// is not the leader for some partition; the client's metadata is
    /// out of date.
    NotLeaderForPartition = 6,
    /// Thrown if the request exceeds the user-specified time limit.
    RequestTimedOut = 7,
    BrokerNotAvailable = 8,
    ReplicaNotAvailable = 9,
    MessageSizeTooLarge = 10,
    StaleControllerEpoch = 11,
    OffsetMetadataTooLarge = 12,
    NetworkException = 13,
    /// Returned for offset fetch / group membership requests while the
    /// coordinator is still loading group metadata.
    GroupLoadInProgress = 14,
    GroupCoordinatorNotAvailable = 15,
    NotCoordinatorForGroup = 16,
    InvalidTopic = 17,
    RecordListTooLarge = 18,
    NotEnoughReplicas = 19,
    NotEnoughReplicasAfterAppend = 20,
    InvalidRequiredAcks = 21,
    /// Returned from group membership requests (heartbeat, sync, commit)
    /// when the generation id provided is not the current one.
    IllegalGeneration = 22,
    InconsistentGroupProtocol = 23,
    InvalidGroupId = 24,
    /// Returned from group requests when the member id is not part of
    /// the current generation.
    UnknownMemberId = 25,
    InvalidSessionTimeout = 26,
    /// Returned in heartbeat/group requests when the coordinator has
    /// begun rebalancing the group; the client should rejoin.
    RebalanceInProgress = 27,
    InvalidCommitOffsetSize = 28,
    TopicAuthorizationFailed = 29,
    GroupAuthorizationFailed = 30,
    ClusterAuthorizationFailed = 31,
    InvalidTimestamp = 32,
    UnsupportedSaslMechanism = 33,
    IllegalSaslState = 34,
    UnsupportedVersion = 35,
    TopicAlreadyExists = 36,
    InvalidPartitions = 37,
    InvalidReplicationFactor = 38,
    InvalidReplicaAssignment = 39,
    InvalidConfig = 40,
    NotController = 41,
    InvalidRequest = 42,
    UnsupportedForMessageFormat = 43,
    PolicyViolation = 44,
}

impl KafkaCode {
    pub fn is_ok(self) -> bool {
        matches!(self, KafkaCode::None)
    }
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("broker rejected the request: {0:?}")]
    KafkaError(KafkaCode),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A malformed or contractually-impossible response from the broker
    /// (empty topics array, zero partitions assigned, etc). Always
    /// terminates the consumer; see the fatal error class in §7.
    #[error("fatal protocol violation: {0}")]
    Fatal(String),

    /// Raised by the offset resolver when the OffsetFetch reply itself
    /// carries a member-invalidation code; causes the Join/Sync
    /// Coordinator to restart with reset-member semantics.
    #[error("offset resolution aborted, rejoin required: {0:?}")]
    ResolveAborted(KafkaCode),
}

pub type Result<T> = std::result::Result<T, Error>;

/// True for the one `Error` class that must terminate the consumer
/// rather than be retried by the Generation Engine's producer loop.
pub fn is_fatal(err: &Error) -> bool {
    matches!(err, Error::Fatal(_))
}

/// The action the generation-lifecycle engine takes in response to a
/// classified broker error or transport failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorAction {
    /// Proceed; nothing went wrong.
    Ok,
    /// Close the current generation and rejoin with the current member id.
    Rejoin,
    /// Close the current generation, sleep one session timeout, and
    /// rejoin with an empty member id.
    ResetMember,
    /// Recover the offset via a time-based lookup and reissue the fetch;
    /// does not close the generation.
    RetryFetch,
    /// Close the current generation; used for partition-transient errors
    /// on fetch.
    ClosePartition,
    /// Unrecoverable; surface to the caller and stop the consumer.
    Fatal,
}

/// The context a broker error was observed in, since the same code can
/// classify differently depending on which RPC produced it (e.g.
/// `OffsetOutOfRange` only makes sense on Fetch).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorContext {
    JoinGroup,
    SyncGroup,
    Heartbeat,
    OffsetFetch,
    OffsetCommit,
    Fetch,
}

/// Pure function mapping a broker error code, observed in a given RPC
/// context, to the lifecycle action the caller should take.
///
/// This is the sole component responsible for error-code classification
/// (C1 in the design); every other component defers to it rather than
/// re-deriving its own rules.
pub fn classify(code: KafkaCode, context: ErrorContext) -> ErrorAction {
    use ErrorAction::*;
    use KafkaCode::*;

    if code.is_ok() {
        return Ok;
    }

    match (context, code) {
        (_, IllegalGeneration) | (_, RebalanceInProgress) => Rejoin,
        (_, UnknownMemberId) => ResetMember,
        (ErrorContext::Fetch, OffsetOutOfRange) => RetryFetch,
        (ErrorContext::Fetch, UnknownTopicOrPartition)
        | (ErrorContext::Fetch, NotLeaderForPartition) => ClosePartition,
        (ErrorContext::OffsetCommit, _) => Rejoin,
        (ErrorContext::OffsetFetch, _) => Rejoin,
        (ErrorContext::JoinGroup, _) => Rejoin,
        (ErrorContext::SyncGroup, _) => Rejoin,
        (ErrorContext::Heartbeat, _) => Rejoin,
        (ErrorContext::Fetch, _) => ClosePartition,
    }
}

/// Classifies a transport-level (I/O) failure, which carries no broker
/// error code. Heartbeat tolerates it as a rejoin signal; fetch and
/// commit treat it as an immediate close.
pub fn classify_transport(context: ErrorContext) -> ErrorAction {
    match context {
        ErrorContext::Heartbeat => ErrorAction::Rejoin,
        _ => ErrorAction::ClosePartition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_code_always_proceeds() {
        assert_eq!(classify(KafkaCode::None, ErrorContext::Fetch), ErrorAction::Ok);
        assert_eq!(
            classify(KafkaCode::None, ErrorContext::Heartbeat),
            ErrorAction::Ok
        );
    }

    #[test]
    fn rebalance_signals_rejoin_in_any_context() {
        for ctx in [
            ErrorContext::JoinGroup,
            ErrorContext::SyncGroup,
            ErrorContext::Heartbeat,
            ErrorContext::OffsetCommit,
            ErrorContext::Fetch,
        ] {
            assert_eq!(
                classify(KafkaCode::IllegalGeneration, ctx),
                ErrorAction::Rejoin
            );
            assert_eq!(
                classify(KafkaCode::RebalanceInProgress, ctx),
                ErrorAction::Rejoin
            );
        }
    }

    #[test]
    fn unknown_member_resets_member_id_everywhere() {
        assert_eq!(
            classify(KafkaCode::UnknownMemberId, ErrorContext::Heartbeat),
            ErrorAction::ResetMember
        );
        assert_eq!(
            classify(KafkaCode::UnknownMemberId, ErrorContext::JoinGroup),
            ErrorAction::ResetMember
        );
    }

    #[test]
    fn offset_out_of_range_only_recoverable_on_fetch() {
        assert_eq!(
            classify(KafkaCode::OffsetOutOfRange, ErrorContext::Fetch),
            ErrorAction::RetryFetch
        );
    }

    #[test]
    fn partition_transient_closes_on_fetch() {
        assert_eq!(
            classify(KafkaCode::UnknownTopicOrPartition, ErrorContext::Fetch),
            ErrorAction::ClosePartition
        );
        assert_eq!(
            classify(KafkaCode::NotLeaderForPartition, ErrorContext::Fetch),
            ErrorAction::ClosePartition
        );
    }

    #[test]
    fn only_fatal_class_is_terminal() {
        assert!(is_fatal(&Error::Fatal("broken".into())));
        assert!(!is_fatal(&Error::KafkaError(KafkaCode::UnknownMemberId)));
        assert!(!is_fatal(&Error::ResolveAborted(KafkaCode::IllegalGeneration)));
    }

    #[test]
    fn transport_failure_rejoins_heartbeat_but_closes_fetch() {
        assert_eq!(
            classify_transport(ErrorContext::Heartbeat),
            ErrorAction::Rejoin
        );
        assert_eq!(
            classify_transport(ErrorContext::Fetch),
            ErrorAction::ClosePartition
        );
        assert_eq!(
            classify_transport(ErrorContext::OffsetCommit),
            ErrorAction::ClosePartition
        );
    }
}
