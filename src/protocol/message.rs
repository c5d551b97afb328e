//! Message sets: the record batches returned by a Fetch.
//!
//! This module defines only the in-memory shape of a message set, not its
//! wire encoding — the byte-level codec is an external collaborator (see
//! the crate's module docs).

/// A single Kafka record within a message set.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// A batch of records returned by a Fetch, in offset order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MessageSet {
    pub messages: Vec<Message>,
}

impl MessageSet {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The offset of the first message in the set, i.e. the checkpoint a
    /// consumer has *begun* (but not necessarily finished) processing
    /// when this set is emitted.
    pub fn first_offset(&self) -> Option<i64> {
        self.messages.first().map(|m| m.offset)
    }

    fn last_offset(&self) -> Option<i64> {
        self.messages.last().map(|m| m.offset)
    }

    /// The offset a subsequent fetch should resume from:
    /// `max(high_watermark, last_message_offset + 1)` when the set is
    /// non-empty. Kept as an associated function (rather than a method
    /// alone) so its contract — defined in terms of a set and a
    /// watermark — reads the same as the design notes.
    pub fn next_offset(ms: &MessageSet, high_watermark: i64) -> i64 {
        match ms.last_offset() {
            Some(last) => high_watermark.max(last + 1),
            None => high_watermark,
        }
    }
}
