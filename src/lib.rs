//! Generation lifecycle engine and per-partition fetch/commit loops for
//! a Kafka consumer-group client.
//!
//! This crate owns the state machine a consumer-group member runs: join
//! the group, take part in partition assignment (leading it when
//! elected), resolve initial offsets, maintain liveness via heartbeats,
//! and expose a lazy per-partition stream of message sets paired with
//! commit actions. It is generic over a [`connection::KafkaConnection`]
//! implementation; the wire codec, broker connection pool, and
//! group-coordinator discovery live outside this crate.

#![allow(dead_code)]

pub mod assignor;
pub mod commit;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod generation;
pub mod heartbeat;
pub mod protocol;
#[cfg(test)]
mod test_support;

pub use assignor::{PartitionAssignor, RangeAssignor, TopicPartition};
pub use config::{ConsumerConfig, InitialFetchTime};
pub use connection::{BrokerRef, CancellationToken, KafkaConnection};
pub use engine::{Consumer, GenerationOutput, GenerationStream, PartitionHandle};
pub use error::{classify, classify_transport, Error, ErrorAction, ErrorContext, KafkaCode, Result};
pub use fetch::{FetchItem, PartitionStream};
pub use generation::{Closed, GenerationState, TopicPartitionAssignment};
