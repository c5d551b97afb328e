//! Join/Sync Coordinator (C6): joins the group, performs leader-side
//! range assignment when elected, syncs the group, resolves initial
//! offsets, and produces a fresh `GenerationState`.

use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, warn};

use crate::assignor::{PartitionAssignor, TopicPartition};
use crate::config::ConsumerConfig;
use crate::connection::KafkaConnection;
use crate::error::{classify, Error, ErrorAction, ErrorContext, Result};
use crate::generation::{Closed, GenerationState, TopicPartitionAssignment};
use crate::offset_resolver::resolve_initial_offset;
use crate::protocol::{
    GroupAssignment, GroupProtocolMetadata, JoinGroupProtocol, JoinGroupRequest, JoinGroupResponse,
    MemberAssignment, SyncGroupRequest, CONSUMER_PROTOCOL_TYPE, RANGE_ASSIGNMENT_STRATEGY,
};

/// `join(prevMemberId) -> GenerationState`. Internally loops through
/// rebalance-class retries of JoinGroup/SyncGroup; only returns once a
/// generation has been established (or a fatal error occurs).
pub async fn join(
    conn: Arc<dyn KafkaConnection>,
    config: &ConsumerConfig,
    assignor: &dyn PartitionAssignor,
    prev_member_id: Option<String>,
) -> Result<GenerationState> {
    let mut member_id = prev_member_id.unwrap_or_default();

    if !member_id.is_empty() {
        conn.reconnect().await?;
    }

    loop {
        let coordinator = conn.group_coordinator(&config.group_id).await?;

        debug!(
            "member `{}` is joining the `{}` group",
            member_id, config.group_id
        );

        let join_req = JoinGroupRequest {
            group_id: config.group_id.clone(),
            session_timeout_millis: config.session_timeout.as_millis() as i32,
            member_id: member_id.clone(),
            protocol_type: CONSUMER_PROTOCOL_TYPE.to_string(),
            group_protocols: vec![JoinGroupProtocol {
                protocol_name: RANGE_ASSIGNMENT_STRATEGY.to_string(),
                metadata: GroupProtocolMetadata {
                    version: 0,
                    topics: config.topics.clone(),
                    user_data: Vec::new(),
                },
            }],
        };

        let join_resp = conn.join_group(&coordinator, join_req).await?;

        match classify(join_resp.error_code, ErrorContext::JoinGroup) {
            ErrorAction::Ok => {}
            ErrorAction::ResetMember => {
                warn!(
                    "member `{}` unknown to group `{}`, sleeping before rejoining with a fresh member id",
                    member_id, config.group_id
                );
                tokio::time::sleep(config.session_timeout).await;
                member_id = String::new();
                continue;
            }
            _ => {
                // rebalance-class or other non-ok JoinGroup error:
                // restart with the same member id.
                continue;
            }
        }

        member_id = join_resp.member_id.clone();

        let group_assignment = if join_resp.is_leader() {
            debug!(
                "member `{}` joined group `{}` as leader",
                member_id, config.group_id
            );
            build_leader_assignment(&conn, config, assignor, &join_resp).await?
        } else {
            debug!(
                "member `{}` joined group `{}` as follower",
                member_id, config.group_id
            );
            Vec::new()
        };

        let sync_req = SyncGroupRequest {
            group_id: config.group_id.clone(),
            generation_id: join_resp.generation_id,
            member_id: member_id.clone(),
            group_assignment,
        };

        let sync_resp = conn.sync_group(&coordinator, sync_req).await?;

        match classify(sync_resp.error_code, ErrorContext::SyncGroup) {
            ErrorAction::Ok => {}
            ErrorAction::ResetMember => {
                tokio::time::sleep(config.session_timeout).await;
                member_id = String::new();
                continue;
            }
            _ => {
                // restart the whole join with the freshly-issued member id
                continue;
            }
        }

        debug!("group `{}` synced up", config.group_id);

        match finish_generation(
            conn.clone(),
            config,
            coordinator,
            join_resp.generation_id,
            join_resp.leader_id,
            member_id.clone(),
            sync_resp.member_assignment,
        )
        .await
        {
            Ok(state) => return Ok(state),
            Err(err) if is_resolve_abort(&err) => {
                warn!(
                    "offset resolution for group `{}` aborted, rejoining with reset member id: {}",
                    config.group_id, err
                );
                reset_member_backoff(config).await;
                member_id = String::new();
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn build_leader_assignment(
    conn: &Arc<dyn KafkaConnection>,
    config: &ConsumerConfig,
    assignor: &dyn PartitionAssignor,
    join_resp: &JoinGroupResponse,
) -> Result<Vec<GroupAssignment>> {
    let metadata = conn.metadata(&config.topics).await?;

    let mut topic_partitions: Vec<TopicPartition> = Vec::new();
    for topic in &config.topics {
        if let Some(partitions) = metadata.get(topic) {
            for partition in partitions {
                topic_partitions.push((topic.clone(), *partition));
            }
        }
    }

    let member_ids: Vec<String> = join_resp.members.iter().map(|m| m.member_id.clone()).collect();
    let assignment = assignor.assign(&member_ids, &topic_partitions);

    Ok(assignment
        .into_iter()
        .map(|(member_id, partitions)| GroupAssignment {
            member_id,
            assignment: MemberAssignment {
                version: 0,
                partitions: group_by_topic(partitions),
            },
        })
        .collect())
}

fn group_by_topic(partitions: Vec<TopicPartition>) -> Vec<(String, Vec<i32>)> {
    let mut grouped: Vec<(String, Vec<i32>)> = Vec::new();
    for (topic, partition) in partitions {
        match grouped.iter_mut().find(|(t, _)| *t == topic) {
            Some((_, ps)) => ps.push(partition),
            None => grouped.push((topic, vec![partition])),
        }
    }
    grouped
}

#[allow(clippy::too_many_arguments)]
async fn finish_generation(
    conn: Arc<dyn KafkaConnection>,
    config: &ConsumerConfig,
    coordinator: crate::connection::BrokerRef,
    generation_id: i32,
    leader_id: String,
    member_id: String,
    assignment: MemberAssignment,
) -> Result<GenerationState> {
    // Per REDESIGN FLAGS §R1, an empty assignment is not fatal: a member
    // in excess of available partitions idles for the generation
    // (heartbeat keeps running; it simply has no fetch loops).
    let flat: Vec<(String, i32)> = assignment
        .partitions
        .into_iter()
        .flat_map(|(topic, partitions)| partitions.into_iter().map(move |p| (topic.clone(), p)))
        .collect();

    let resolved = try_join_all(flat.into_iter().map(|(topic, partition)| {
        let conn = conn.clone();
        let coordinator = coordinator.clone();
        let group_id = config.group_id.clone();
        let initial_fetch_time = config.initial_fetch_time;
        async move {
            resolve_initial_offset(&conn, &coordinator, &group_id, &topic, partition, initial_fetch_time)
                .await
                .map(|offset| TopicPartitionAssignment {
                    topic,
                    partition,
                    initial_offset: offset,
                })
        }
    }))
    .await?;

    let closed = Closed::new();

    let weak_closed = closed.downgrade();
    let cancellation = conn.cancellation();
    tokio::spawn(async move {
        cancellation.cancelled().await;
        weak_closed.try_trip();
    });

    let state = GenerationState {
        group_id: config.group_id.clone(),
        generation_id,
        member_id,
        leader_id,
        coordinator,
        assignments: resolved,
        closed,
    };

    Ok(state)
}

/// Aborts with reset-member semantics: sleeps one session timeout and
/// returns the empty member id for the next `join` call. Exposed for the
/// Generation Engine to call when offset resolution raises
/// `Error::ResolveAborted`.
pub async fn reset_member_backoff(config: &ConsumerConfig) {
    tokio::time::sleep(config.session_timeout).await;
}

pub(crate) fn is_resolve_abort(err: &Error) -> bool {
    matches!(err, Error::ResolveAborted(_))
}
