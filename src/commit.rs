//! Commit Action (C5): a deferred, idempotent operation that records a
//! consumer's progress for a single (topic, partition) at the broker.

use std::sync::Arc;

use log::warn;

use crate::connection::{BrokerRef, KafkaConnection};
use crate::error::{classify, classify_transport, Error, ErrorAction, ErrorContext, Result};
use crate::generation::{peek_task, Closed};
use crate::protocol::{OffsetCommitPartition, OffsetCommitRequest, OffsetCommitTopic};

/// Bound to a specific (topic, partition, offset, generation, member);
/// calling it issues (at most) one OffsetCommit RPC. Safe to call more
/// than once — the broker treats repeated commits as idempotent,
/// last-write-wins — and safe to call after the generation has closed,
/// in which case it is a no-op.
pub struct CommitAction {
    conn: Arc<dyn KafkaConnection>,
    coordinator: BrokerRef,
    closed: Closed,
    group_id: String,
    generation_id: i32,
    member_id: String,
    retention_millis: i64,
    topic: String,
    partition: i32,
    offset: i64,
}

impl CommitAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Arc<dyn KafkaConnection>,
        coordinator: BrokerRef,
        closed: Closed,
        group_id: String,
        generation_id: i32,
        member_id: String,
        retention_millis: i64,
        topic: String,
        partition: i32,
        offset: i64,
    ) -> Self {
        CommitAction {
            conn,
            coordinator,
            closed,
            group_id,
            generation_id,
            member_id,
            retention_millis,
            topic,
            partition,
            offset,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Issue the commit. Returns `Ok(())` both on a genuine success and
    /// on any rebalance-class error or transport failure — those close
    /// the generation instead of propagating, per the design's
    /// "non-fatal classes resolve to unit" rule. Only a malformed
    /// response (empty topics array) is returned as an `Err`.
    pub async fn commit(&self) -> Result<()> {
        let req = OffsetCommitRequest {
            group_id: self.group_id.clone(),
            generation_id: self.generation_id,
            member_id: self.member_id.clone(),
            retention_millis: self.retention_millis,
            topics: vec![OffsetCommitTopic {
                topic_name: self.topic.clone(),
                partitions: vec![OffsetCommitPartition {
                    partition: self.partition,
                    offset: self.offset,
                    metadata: String::new(),
                }],
            }],
        };

        let outcome = peek_task(&self.closed, None, || async {
            Some(self.conn.offset_commit(&self.coordinator, req).await)
        })
        .await;

        let resp = match outcome {
            None => return Ok(()),
            Some(Ok(resp)) => resp,
            Some(Err(_)) => {
                if classify_transport(ErrorContext::OffsetCommit) != ErrorAction::Ok {
                    self.closed.trip();
                }
                return Ok(());
            }
        };

        if resp.topics.is_empty() {
            return Err(Error::Fatal(
                "OffsetCommit response carried no topics".to_string(),
            ));
        }

        let partition_result = resp
            .topics
            .iter()
            .find(|t| t.topic_name == self.topic)
            .and_then(|t| t.partitions.iter().find(|p| p.partition == self.partition));

        let error_code = match partition_result {
            Some(p) => p.error_code,
            None => {
                return Err(Error::Fatal(format!(
                    "OffsetCommit response missing entry for {}-{}",
                    self.topic, self.partition
                )))
            }
        };

        match classify(error_code, ErrorContext::OffsetCommit) {
            ErrorAction::Ok => {}
            _ => {
                warn!(
                    "offset commit for {}-{} at generation {} failed with {:?}, closing generation",
                    self.topic, self.partition, self.generation_id, error_code
                );
                self.closed.trip();
            }
        }

        Ok(())
    }
}
