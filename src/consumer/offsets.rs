//! Pending-commit bookkeeping.

use std::collections::HashMap;

use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext};
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::Mutex;
use tracing::debug;

use crate::consumer::error::ConsumerResult;

/// Tracks the next offset to commit per partition.
///
/// A position is recorded only after the handler acknowledged the batch, and
/// it never moves backwards, so the broker always sees non-decreasing commit
/// positions per partition.
#[derive(Debug, Default)]
pub struct CommitTracker {
    pending: Mutex<HashMap<(String, i32), i64>>,
}

impl CommitTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `next_offset` (one past the last handled offset) for a
    /// partition. Stale positions are ignored.
    pub async fn record(&self, topic: &str, partition: i32, next_offset: i64) {
        let mut pending = self.pending.lock().await;
        let entry = pending
            .entry((topic.to_string(), partition))
            .or_insert(next_offset);
        if *entry < next_offset {
            *entry = next_offset;
        }
        debug!(topic, partition, next_offset, "commit position recorded");
    }

    /// Number of partitions with an uncommitted position.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Commit every pending position synchronously. Positions stay pending
    /// when the commit fails so the next cycle retries them. Returns how many
    /// partitions were committed.
    pub async fn commit<C, K>(&self, consumer: &K) -> ConsumerResult<usize>
    where
        C: ConsumerContext,
        K: Consumer<C>,
    {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut list = TopicPartitionList::new();
        for ((topic, partition), next_offset) in pending.iter() {
            list.add_partition_offset(topic, *partition, Offset::Offset(*next_offset))?;
        }

        consumer.commit(&list, CommitMode::Sync)?;
        let committed = pending.len();
        pending.clear();
        Ok(committed)
    }
}
