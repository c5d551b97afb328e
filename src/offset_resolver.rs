//! Offset Resolver (C2): for a (topic, partition), returns the initial
//! fetch offset, preferring the group's committed offset and falling
//! back to a time-based lookup.

use std::sync::Arc;

use crate::config::InitialFetchTime;
use crate::connection::{BrokerRef, KafkaConnection};
use crate::error::{Error, KafkaCode, Result};
use crate::protocol::{OffsetFetchRequest, OffsetRequest, NO_COMMITTED_OFFSET};

/// Resolves the initial fetch offset for a single (topic, partition).
///
/// Issues at most two broker RPCs: an OffsetFetch, and — only if the
/// group has no committed offset for the partition — a time-based
/// Offset lookup using `initial_fetch_time`.
pub async fn resolve_initial_offset(
    conn: &Arc<dyn KafkaConnection>,
    coordinator: &BrokerRef,
    group_id: &str,
    topic: &str,
    partition: i32,
    initial_fetch_time: InitialFetchTime,
) -> Result<i64> {
    let req = OffsetFetchRequest {
        group_id: group_id.to_string(),
        partitions: vec![(topic.to_string(), partition)],
    };

    let resp = conn.offset_fetch(coordinator, req).await?;

    let committed = resp
        .topics
        .iter()
        .find(|t| t.topic_name == topic)
        .and_then(|t| t.partitions.iter().find(|p| p.partition == partition));

    let committed = match committed {
        Some(p) => p,
        None => {
            return Err(Error::Fatal(format!(
                "OffsetFetch response missing entry for {}-{}",
                topic, partition
            )))
        }
    };

    if !committed.error_code.is_ok() {
        match committed.error_code {
            KafkaCode::UnknownMemberId | KafkaCode::IllegalGeneration => {
                return Err(Error::ResolveAborted(committed.error_code));
            }
            other => return Err(Error::KafkaError(other)),
        }
    }

    if committed.offset != NO_COMMITTED_OFFSET {
        return Ok(committed.offset);
    }

    let time_req = OffsetRequest {
        replica_id: -1,
        topic_name: topic.to_string(),
        partition,
        time: initial_fetch_time.as_wire_time(),
        max_offsets: 1,
    };

    let time_resp = conn.offset(time_req).await?;

    if !time_resp.error_code.is_ok() {
        return Err(Error::KafkaError(time_resp.error_code));
    }

    time_resp
        .offsets
        .first()
        .copied()
        .ok_or_else(|| Error::Fatal(format!("Offset response for {}-{} returned no offsets", topic, partition)))
}
