//! Partition assignment strategies.
//!
//! The current implementation hard-codes range-by-index assignment;
//! abstracted as a trait so a round-robin strategy can be added later
//! without touching the Join/Sync Coordinator (per the design notes).

/// A (topic, partition) pair as discovered from cluster metadata, in the
/// metadata's natural order.
pub type TopicPartition = (String, i32);

/// Computes how the subscribed (topic, partition) pairs are divided
/// among the group's members. Only invoked by the member elected leader.
pub trait PartitionAssignor: Send + Sync {
    fn name(&self) -> &'static str;

    /// `members` is in JoinGroup response order (the leader is always
    /// `members[0]`'s caller, but that's incidental — order matters for
    /// determinism, not for who's leader). Returns, for each member id,
    /// the partitions assigned to it; a member in excess of available
    /// partitions is present in the map with an empty vector rather than
    /// omitted, so callers can tell "idles gracefully" apart from "never
    /// considered".
    fn assign(
        &self,
        members: &[String],
        partitions: &[TopicPartition],
    ) -> Vec<(String, Vec<TopicPartition>)>;
}

/// Splits the partition list into contiguous, as-even-as-possible
/// chunks, with any remainder distributed to the leading chunks, and
/// zips them with members in member-list order.
///
/// Resolves the "more consumers than partitions" open question (REDESIGN
/// FLAGS §R1): a member past the end of the partition list receives an
/// explicit empty assignment rather than being fatal.
pub struct RangeAssignor;

impl PartitionAssignor for RangeAssignor {
    fn name(&self) -> &'static str {
        "range"
    }

    fn assign(
        &self,
        members: &[String],
        partitions: &[TopicPartition],
    ) -> Vec<(String, Vec<TopicPartition>)> {
        let member_count = members.len();
        if member_count == 0 {
            return Vec::new();
        }

        let total = partitions.len();
        let base = total / member_count;
        let remainder = total % member_count;

        let mut result = Vec::with_capacity(member_count);
        let mut start = 0;
        for (idx, member_id) in members.iter().enumerate() {
            let chunk_size = base + if idx < remainder { 1 } else { 0 };
            let end = (start + chunk_size).min(total);
            let chunk = partitions[start..end].to_vec();
            result.push((member_id.clone(), chunk));
            start = end;
        }
        result
    }
}
