//! Generation Engine (C7): drives the Join/Sync Coordinator through
//! successive generations and exposes the two public consumption
//! patterns built on top of the resulting lazy sequence.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;

use crate::assignor::{PartitionAssignor, RangeAssignor};
use crate::commit::CommitAction;
use crate::config::ConsumerConfig;
use crate::connection::KafkaConnection;
use crate::coordinator;
use crate::error::{self, Error, Result};
use crate::fetch::{self, FetchItem, PartitionStream};
use crate::generation::Closed;
use crate::protocol::MessageSet;

const DEFAULT_PARTITION_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_GENERATION_CHANNEL_CAPACITY: usize = 1;

/// A single assigned (topic, partition) and its lazy fetch stream, handed
/// out for one generation.
pub struct PartitionHandle {
    pub topic: String,
    pub partition: i32,
    pub stream: PartitionStream,
}

/// One element of the generation sequence.
pub struct GenerationOutput {
    pub generation_id: i32,
    pub member_id: String,
    pub leader_id: String,
    pub partitions: Vec<PartitionHandle>,
}

impl GenerationOutput {
    pub fn is_leader(&self) -> bool {
        self.leader_id == self.member_id
    }
}

/// The raw lazy sequence of generations a `Consumer` drives through.
pub type GenerationStream = ReceiverStream<GenerationOutput>;

/// Handle to a single membership in a Kafka consumer group. Wraps the
/// generation sequence and offers two ready-made consumption patterns on
/// top of it; callers who need custom iteration can use
/// [`Consumer::generations`] directly.
pub struct Consumer {
    conn: Arc<dyn KafkaConnection>,
    config: Arc<ConsumerConfig>,
    assignor: Arc<dyn PartitionAssignor>,
}

impl Consumer {
    pub fn new(conn: Arc<dyn KafkaConnection>, config: ConsumerConfig) -> Self {
        Consumer {
            conn,
            config: Arc::new(config),
            assignor: Arc::new(RangeAssignor),
        }
    }

    /// Overrides the partition assignment strategy; the current crate
    /// only ships `RangeAssignor`, but the seam exists for a future
    /// round-robin strategy (see the design notes).
    pub fn with_assignor(mut self, assignor: Arc<dyn PartitionAssignor>) -> Self {
        self.assignor = assignor;
        self
    }

    /// The raw lazy generation sequence. Ends once the connection's
    /// cancellation token fires, the outstanding generation's `closed`
    /// latch has fired in turn, or the producer loop hits a fatal error.
    /// Callers who need to observe that terminal outcome should use
    /// [`Consumer::consume`] or [`Consumer::consume_commit_after`]
    /// instead, which surface it as `Err`.
    pub fn generations(&self) -> GenerationStream {
        self.spawn_generations().0
    }

    /// Spawns the generation producer and returns both the stream of
    /// generations it yields and a oneshot carrying the loop's eventual
    /// outcome, so callers that need to distinguish "ended because the
    /// connection was torn down" from "ended because of a fatal error"
    /// can do so once the stream is exhausted.
    fn spawn_generations(&self) -> (GenerationStream, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = mpsc::channel(DEFAULT_GENERATION_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let conn = self.conn.clone();
        let config = self.config.clone();
        let assignor = self.assignor.clone();

        tokio::spawn(async move {
            let outcome = run_generation_producer(conn, config, assignor, tx).await;
            let _ = outcome_tx.send(outcome);
        });

        (ReceiverStream::new(rx), outcome_rx)
    }

    /// Runs every generation's partitions in parallel, handing each
    /// message set and its commit action to `handler`; the handler
    /// decides when (or whether) to call commit. Returns once the
    /// generation sequence ends, or as soon as any handler invocation
    /// returns `Err`.
    pub async fn consume<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(String, i32, MessageSet, CommitAction) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (mut generations, outcome) = self.spawn_generations();

        while let Some(generation) = generations.next().await {
            run_generation_partitions(generation, handler.clone()).await?;
        }

        // A closed oneshot (producer task gone without sending, which
        // only happens if it panicked) is treated as a clean end; a
        // panic there would already have been reported by `JoinSet` in
        // `run_generation_partitions` for any in-flight partition work.
        outcome.await.unwrap_or(Ok(()))
    }

    /// Like [`Consumer::consume`], but commits automatically after each
    /// successful handler invocation.
    pub async fn consume_commit_after<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(String, i32, MessageSet) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.consume(move |topic, partition, message_set, commit| {
            let handler = handler.clone();
            async move {
                handler(topic, partition, message_set).await?;
                commit.commit().await
            }
        })
        .await
    }
}

async fn run_generation_partitions<F, Fut>(generation: GenerationOutput, handler: F) -> Result<()>
where
    F: Fn(String, i32, MessageSet, CommitAction) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    for handle in generation.partitions {
        let handler = handler.clone();
        tasks.spawn(async move {
            let PartitionHandle {
                topic,
                partition,
                mut stream,
            } = handle;

            while let Some(FetchItem { message_set, commit }) = stream.next().await {
                handler(topic.clone(), partition, message_set, commit).await?;
            }

            Ok::<(), Error>(())
        });
    }

    while let Some(outcome) = tasks.join_next().await {
        outcome.map_err(|err| Error::Fatal(format!("partition task panicked: {}", err)))??;
    }

    Ok(())
}

async fn run_generation_producer(
    conn: Arc<dyn KafkaConnection>,
    config: Arc<ConsumerConfig>,
    assignor: Arc<dyn PartitionAssignor>,
    tx: mpsc::Sender<GenerationOutput>,
) -> Result<()> {
    let mut prev_member_id: Option<String> = None;
    let mut prev_closed: Option<Closed> = None;

    loop {
        if let Some(closed) = prev_closed.take() {
            closed.wait().await;
        }

        if conn.cancellation().is_cancelled() {
            debug!("connection cancelled, ending generation sequence");
            return Ok(());
        }

        let state = match coordinator::join(conn.clone(), &config, assignor.as_ref(), prev_member_id.take()).await {
            Ok(state) => state,
            Err(err) if error::is_fatal(&err) => {
                warn!("join failed fatally, ending generation sequence: {}", err);
                return Err(err);
            }
            Err(err) => {
                warn!(
                    "join failed with a recoverable error, retrying after backoff: {}",
                    err
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.join_retry_backoff) => {}
                    _ = conn.cancellation().cancelled() => return Ok(()),
                }
                continue;
            }
        };

        prev_member_id = Some(state.member_id.clone());
        prev_closed = Some(state.closed.clone());

        tokio::spawn(crate::heartbeat::run(
            conn.clone(),
            state.coordinator.clone(),
            state.closed.clone(),
            state.group_id.clone(),
            state.generation_id,
            state.member_id.clone(),
            config.heartbeat_interval(),
        ));

        let partitions = state
            .assignments
            .into_iter()
            .map(|assignment| {
                let stream = fetch::spawn(
                    conn.clone(),
                    state.coordinator.clone(),
                    state.closed.clone(),
                    state.group_id.clone(),
                    state.generation_id,
                    state.member_id.clone(),
                    assignment.topic.clone(),
                    assignment.partition,
                    assignment.initial_offset,
                    config.clone(),
                    DEFAULT_PARTITION_CHANNEL_CAPACITY,
                );
                PartitionHandle {
                    topic: assignment.topic,
                    partition: assignment.partition,
                    stream,
                }
            })
            .collect();

        let output = GenerationOutput {
            generation_id: state.generation_id,
            member_id: state.member_id,
            leader_id: state.leader_id,
            partitions,
        };

        if tx.send(output).await.is_err() {
            debug!("generation consumer dropped, ending generation sequence");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignor::RangeAssignor;
    use crate::error::KafkaCode;
    use crate::protocol::{
        FetchResponse, JoinGroupResponse, Message, MemberAssignment, PartitionData, SyncGroupResponse, TopicData,
        RANGE_ASSIGNMENT_STRATEGY,
    };
    use crate::test_support::FakeConnection;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn config() -> ConsumerConfig {
        ConsumerConfig {
            group_id: "g".into(),
            topics: vec!["t".into()],
            session_timeout: Duration::from_millis(200),
            heartbeat_frequency: 4,
            empty_fetch_backoff: Duration::from_millis(20),
            out_of_range_backoff: Duration::from_millis(20),
            join_retry_backoff: Duration::from_millis(20),
            ..ConsumerConfig::default()
        }
    }

    fn solo_join_reply() -> JoinGroupResponse {
        JoinGroupResponse {
            error_code: KafkaCode::None,
            generation_id: 1,
            group_protocol: RANGE_ASSIGNMENT_STRATEGY.into(),
            leader_id: "m1".into(),
            member_id: "m1".into(),
            members: vec![],
        }
    }

    fn fetch_response(offset_start: i64, count: i64, high_watermark: i64) -> FetchResponse {
        let messages = (0..count)
            .map(|i| Message {
                offset: offset_start + i,
                key: None,
                value: Some(b"v".to_vec()),
            })
            .collect();
        FetchResponse {
            topics: vec![TopicData {
                topic_name: "t".into(),
                partitions: vec![PartitionData {
                    partition: 0,
                    error_code: KafkaCode::None,
                    high_watermark_offset: high_watermark,
                    message_set: MessageSet { messages },
                }],
            }],
        }
    }

    #[tokio::test]
    async fn generations_stream_yields_assigned_partitions() {
        let fake = Arc::new(FakeConnection::new());
        fake.push_join_group_reply(solo_join_reply());
        fake.push_sync_group_reply(SyncGroupResponse {
            error_code: KafkaCode::None,
            member_assignment: MemberAssignment {
                version: 0,
                partitions: vec![("t".into(), vec![0])],
            },
        });
        fake.set_offset_fetch_reply("t", 0, 0, KafkaCode::None);
        fake.push_fetch_reply(fetch_response(0, 2, 2));
        let conn: Arc<dyn KafkaConnection> = fake.clone();

        let consumer = Consumer::new(conn, config());
        let mut generations = consumer.generations();

        let generation = generations.next().await.expect("one generation");
        assert_eq!(generation.generation_id, 1);
        assert!(generation.is_leader());
        assert_eq!(generation.partitions.len(), 1);

        let mut stream = generation.partitions.into_iter().next().unwrap().stream;
        let item = stream.next().await.unwrap();
        assert_eq!(item.message_set.first_offset(), Some(0));
    }

    #[tokio::test]
    async fn consume_commit_after_commits_every_message_set() {
        let fake = Arc::new(FakeConnection::new());
        fake.push_join_group_reply(solo_join_reply());
        fake.push_sync_group_reply(SyncGroupResponse {
            error_code: KafkaCode::None,
            member_assignment: MemberAssignment {
                version: 0,
                partitions: vec![("t".into(), vec![0])],
            },
        });
        fake.set_offset_fetch_reply("t", 0, 0, KafkaCode::None);
        fake.push_fetch_reply(fetch_response(0, 1, 1));
        fake.push_fetch_reply(FetchResponse {
            topics: vec![TopicData {
                topic_name: "t".into(),
                partitions: vec![PartitionData {
                    partition: 0,
                    error_code: KafkaCode::None,
                    high_watermark_offset: 1,
                    message_set: MessageSet::default(),
                }],
            }],
        });
        let conn: Arc<dyn KafkaConnection> = fake.clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_handler = seen.clone();
        let fake_for_close = fake.clone();

        let consumer = Consumer::new(conn, config());

        let consume = tokio::spawn(async move {
            consumer
                .consume_commit_after(move |topic, partition, message_set| {
                    let seen = seen_handler.clone();
                    async move {
                        seen.lock().await.push((topic, partition, message_set.first_offset()));
                        Ok(())
                    }
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fake_for_close.offset_commit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().await.len(), 1);

        fake_for_close.cancellation_token().cancel();
        tokio::time::timeout(Duration::from_millis(500), consume)
            .await
            .expect("consume should end once cancelled")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn range_assignor_is_the_default() {
        let fake = Arc::new(FakeConnection::new());
        let conn: Arc<dyn KafkaConnection> = fake;
        let _consumer = Consumer::new(conn, ConsumerConfig::default()).with_assignor(Arc::new(RangeAssignor));
    }

    #[tokio::test]
    async fn fatal_error_during_join_surfaces_as_err_from_consume() {
        let fake = Arc::new(FakeConnection::new());
        fake.push_join_group_reply(solo_join_reply());
        fake.push_sync_group_reply(SyncGroupResponse {
            error_code: KafkaCode::None,
            member_assignment: MemberAssignment {
                version: 0,
                partitions: vec![("t".into(), vec![0])],
            },
        });
        // Scripted for a different topic than the assignment carries, so
        // the offset resolver finds no matching entry and raises Fatal.
        fake.set_offset_fetch_reply("other-topic", 0, 0, KafkaCode::None);
        let conn: Arc<dyn KafkaConnection> = fake.clone();

        let consumer = Consumer::new(conn, config());

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            consumer.consume_commit_after(|_, _, _| async { Ok(()) }),
        )
        .await
        .expect("consume should end promptly on a fatal error");

        assert!(matches!(result, Err(Error::Fatal(_))));
    }

    #[tokio::test]
    async fn transport_transient_failure_retries_join_instead_of_ending() {
        let fake = Arc::new(FakeConnection::new());
        fake.fail_group_coordinator_times(1);
        fake.push_join_group_reply(solo_join_reply());
        fake.push_sync_group_reply(SyncGroupResponse {
            error_code: KafkaCode::None,
            member_assignment: MemberAssignment {
                version: 0,
                partitions: vec![("t".into(), vec![0])],
            },
        });
        fake.set_offset_fetch_reply("t", 0, 0, KafkaCode::None);
        let conn: Arc<dyn KafkaConnection> = fake.clone();

        let consumer = Consumer::new(conn, config());
        let mut generations = consumer.generations();

        let generation = tokio::time::timeout(Duration::from_secs(2), generations.next())
            .await
            .expect("join should succeed once it retries past the transient failure")
            .expect("one generation");

        assert_eq!(generation.generation_id, 1);
        assert_eq!(fake.join_group_calls.load(Ordering::SeqCst), 1);
    }
}
