//! Partition Fetch Loop (C3): a lazy, per-partition sequence of
//! `(MessageSet, CommitAction)` pairs, realized as a bounded channel
//! whose producer task owns the fetch/retry/escalate loop.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::commit::CommitAction;
use crate::config::ConsumerConfig;
use crate::connection::{BrokerRef, KafkaConnection};
use crate::error::{classify, classify_transport, Error, ErrorAction, ErrorContext};
use crate::generation::{peek_task, Closed};
use crate::protocol::{FetchPartition, FetchRequest, FetchTopic, MessageSet, OffsetRequest};

/// One element of a partition's fetch stream: a message set and the
/// commit action bound to the offset it started at.
pub struct FetchItem {
    pub message_set: MessageSet,
    pub commit: CommitAction,
}

/// A lazy, restartable-from-offset, close-aware stream of
/// `(MessageSet, CommitAction)` pairs for a single (topic, partition).
/// NOT restartable after the underlying channel closes; restart is the
/// Generation Engine's job, via a new generation.
pub type PartitionStream = ReceiverStream<FetchItem>;

/// Spawns the producer task for a partition's fetch loop and returns the
/// stream the caller iterates. `channel_capacity` bounds how far the
/// producer can run ahead of a slow consumer (natural backpressure).
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    conn: Arc<dyn KafkaConnection>,
    coordinator: BrokerRef,
    closed: Closed,
    group_id: String,
    generation_id: i32,
    member_id: String,
    topic: String,
    partition: i32,
    start_offset: i64,
    config: Arc<ConsumerConfig>,
    channel_capacity: usize,
) -> PartitionStream {
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));

    tokio::spawn(async move {
        run_producer(
            conn,
            coordinator,
            closed,
            group_id,
            generation_id,
            member_id,
            topic,
            partition,
            start_offset,
            config,
            tx,
        )
        .await;
    });

    ReceiverStream::new(rx)
}

#[allow(clippy::too_many_arguments)]
async fn run_producer(
    conn: Arc<dyn KafkaConnection>,
    coordinator: BrokerRef,
    closed: Closed,
    group_id: String,
    generation_id: i32,
    member_id: String,
    topic: String,
    partition: i32,
    mut offset: i64,
    config: Arc<ConsumerConfig>,
    tx: mpsc::Sender<FetchItem>,
) {
    loop {
        let req = FetchRequest {
            replica_id: -1,
            max_wait_millis: config.fetch_max_wait.as_millis() as i32,
            min_bytes: config.fetch_min_bytes,
            topics: vec![FetchTopic {
                topic_name: topic.clone(),
                partitions: vec![FetchPartition {
                    partition,
                    fetch_offset: offset,
                    max_bytes: config.fetch_buffer_bytes,
                }],
            }],
        };

        let outcome = peek_task(&closed, None, || async { Some(conn.fetch(req).await) }).await;

        let resp = match outcome {
            None => return,
            Some(Ok(resp)) => resp,
            Some(Err(err)) => {
                warn!(
                    "fetch transport failure for {}-{} at generation {}: {}",
                    topic, partition, generation_id, err
                );
                if classify_transport(ErrorContext::Fetch) != ErrorAction::Ok {
                    closed.trip();
                }
                return;
            }
        };

        if resp.topics.is_empty() {
            warn!(
                "fetch response for {}-{} carried no topics; broker protocol violation",
                topic, partition
            );
            closed.trip();
            return;
        }

        let partition_data = resp
            .topics
            .iter()
            .find(|t| t.topic_name == topic)
            .and_then(|t| t.partitions.iter().find(|p| p.partition == partition));

        let partition_data = match partition_data {
            Some(p) => p,
            None => {
                closed.trip();
                return;
            }
        };

        match classify(partition_data.error_code, ErrorContext::Fetch) {
            ErrorAction::Ok => {}
            ErrorAction::RetryFetch => {
                match recover_offset(&conn, &topic, partition, &config).await {
                    Ok(recovered) => {
                        debug!(
                            "offset out of range for {}-{}, recovered to {}",
                            topic, partition, recovered
                        );
                        offset = recovered;
                    }
                    Err(err) => {
                        warn!(
                            "failed to recover out-of-range offset for {}-{}: {}",
                            topic, partition, err
                        );
                        closed.trip();
                        return;
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(config.out_of_range_backoff) => {}
                    _ = closed.wait() => return,
                }
                continue;
            }
            _ => {
                closed.trip();
                return;
            }
        }

        if partition_data.message_set.is_empty() {
            debug!("reached end of stream for {}-{} at offset {}", topic, partition, offset);
            tokio::select! {
                _ = tokio::time::sleep(config.empty_fetch_backoff) => {}
                _ = closed.wait() => return,
            }
            continue;
        }

        let commit = CommitAction::new(
            conn.clone(),
            coordinator.clone(),
            closed.clone(),
            group_id.clone(),
            generation_id,
            member_id.clone(),
            config.offset_retention_millis(),
            topic.clone(),
            partition,
            offset,
        );

        let next_offset = MessageSet::next_offset(&partition_data.message_set, partition_data.high_watermark_offset);
        let item = FetchItem {
            message_set: partition_data.message_set.clone(),
            commit,
        };

        if tx.send(item).await.is_err() {
            // Receiver dropped: downstream stopped iterating. Nothing
            // else to do; the loop simply stops producing.
            return;
        }

        offset = next_offset;
    }
}

async fn recover_offset(
    conn: &Arc<dyn KafkaConnection>,
    topic: &str,
    partition: i32,
    config: &ConsumerConfig,
) -> Result<i64, Error> {
    let req = OffsetRequest {
        replica_id: -1,
        topic_name: topic.to_string(),
        partition,
        time: config.initial_fetch_time.as_wire_time(),
        max_offsets: 1,
    };

    let resp = conn.offset(req).await?;

    if !resp.error_code.is_ok() {
        return Err(Error::KafkaError(resp.error_code));
    }

    resp.offsets
        .first()
        .copied()
        .ok_or_else(|| Error::Fatal(format!("Offset response for {}-{} returned no offsets", topic, partition)))
}
