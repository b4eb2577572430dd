//! Partition-homogeneous message batches.

use std::collections::BTreeMap;

use rdkafka::message::Message;

use crate::consumer::error::{ConsumerError, ConsumerResult};

/// A single message decoded at the rdkafka ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMessage {
    /// Partition the message was read from.
    pub partition: i32,
    /// Broker offset of the message.
    pub offset: i64,
    /// Message key, if present.
    pub key: Option<Vec<u8>>,
    /// Message payload, if present.
    pub payload: Option<Vec<u8>>,
    /// Broker or producer timestamp in milliseconds, if present.
    pub timestamp: Option<i64>,
}

impl BatchMessage {
    /// Decode an rdkafka message.
    pub fn from_kafka<M: Message>(message: &M) -> Self {
        Self {
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            timestamp: message.timestamp().to_millis(),
        }
    }
}

/// A non-empty run of messages from one partition in strictly increasing
/// offset order, bounded by the configured batch size.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    topic: String,
    partition: i32,
    messages: Vec<BatchMessage>,
}

impl MessageBatch {
    /// Build a batch, enforcing non-emptiness, partition homogeneity, and
    /// strict offset monotonicity.
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        messages: Vec<BatchMessage>,
    ) -> ConsumerResult<Self> {
        if messages.is_empty() {
            return Err(ConsumerError::Config("batch cannot be empty".to_string()));
        }
        if messages.iter().any(|message| message.partition != partition) {
            return Err(ConsumerError::Config(format!(
                "batch for partition {partition} contains foreign messages"
            )));
        }
        if messages
            .windows(2)
            .any(|pair| pair[1].offset <= pair[0].offset)
        {
            return Err(ConsumerError::Config(format!(
                "batch for partition {partition} is not strictly increasing in offset"
            )));
        }
        Ok(Self {
            topic: topic.into(),
            partition,
            messages,
        })
    }

    /// Topic the batch was read from.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition all messages belong to.
    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// The messages, in broker order.
    pub fn messages(&self) -> &[BatchMessage] {
        &self.messages
    }

    /// Number of messages in the batch. Always at least 1.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; batches are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Offset of the first message.
    pub fn first_offset(&self) -> i64 {
        self.messages[0].offset
    }

    /// Offset of the last message.
    pub fn last_offset(&self) -> i64 {
        self.messages[self.messages.len() - 1].offset
    }
}

/// Accumulates polled messages into bounded per-partition runs.
///
/// A run seals as soon as it reaches `max_batch_size`; shorter runs are
/// sealed by the poll loop's linger tick via [`BatchAssembler::drain`]. If
/// the broker replays an offset (rebalance rewind), the open run is sealed
/// first so every batch stays strictly monotonic.
#[derive(Debug)]
pub(crate) struct BatchAssembler {
    max_batch_size: usize,
    runs: BTreeMap<(String, i32), Vec<BatchMessage>>,
}

impl BatchAssembler {
    pub(crate) fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            runs: BTreeMap::new(),
        }
    }

    /// Add one message; returns the batches sealed by this push. A run seals
    /// when it fills up, and also when the incoming offset breaks the run's
    /// order (both can happen in one push when `max_batch_size` is 1).
    pub(crate) fn push(&mut self, topic: &str, message: BatchMessage) -> Vec<MessageBatch> {
        let key = (topic.to_string(), message.partition);
        let mut sealed = Vec::new();

        let run = self.runs.entry(key.clone()).or_default();
        if run.last().is_some_and(|last| last.offset >= message.offset) {
            sealed.extend(seal(&key, std::mem::take(run)));
        }

        let run = self.runs.entry(key.clone()).or_default();
        run.push(message);
        if run.len() >= self.max_batch_size {
            sealed.extend(seal(&key, std::mem::take(run)));
        }
        sealed
    }

    /// Seal every non-empty run.
    pub(crate) fn drain(&mut self) -> Vec<MessageBatch> {
        let runs = std::mem::take(&mut self.runs);
        runs.into_iter()
            .filter(|(_, messages)| !messages.is_empty())
            .filter_map(|(key, messages)| seal(&key, messages))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.runs.values().all(Vec::is_empty)
    }
}

fn seal(key: &(String, i32), messages: Vec<BatchMessage>) -> Option<MessageBatch> {
    if messages.is_empty() {
        return None;
    }
    Some(MessageBatch {
        topic: key.0.clone(),
        partition: key.1,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(partition: i32, offset: i64) -> BatchMessage {
        BatchMessage {
            partition,
            offset,
            key: None,
            payload: Some(offset.to_string().into_bytes()),
            timestamp: None,
        }
    }

    #[test]
    fn constructor_rejects_empty_batches() {
        assert!(MessageBatch::new("events", 0, vec![]).is_err());
    }

    #[test]
    fn constructor_rejects_foreign_partitions() {
        let messages = vec![message(0, 1), message(1, 2)];
        assert!(MessageBatch::new("events", 0, messages).is_err());
    }

    #[test]
    fn constructor_rejects_non_monotonic_offsets() {
        let messages = vec![message(0, 2), message(0, 2)];
        assert!(MessageBatch::new("events", 0, messages).is_err());

        let messages = vec![message(0, 3), message(0, 1)];
        assert!(MessageBatch::new("events", 0, messages).is_err());
    }

    #[test]
    fn batch_accessors() {
        let batch =
            MessageBatch::new("events", 3, vec![message(3, 10), message(3, 11), message(3, 14)])
                .unwrap();
        assert_eq!(batch.topic(), "events");
        assert_eq!(batch.partition(), 3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.first_offset(), 10);
        assert_eq!(batch.last_offset(), 14);
    }

    #[test]
    fn assembler_seals_full_runs() {
        let mut assembler = BatchAssembler::new(2);
        assert!(assembler.push("events", message(0, 1)).is_empty());
        let sealed = assembler.push("events", message(0, 2));
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].partition(), 0);
        assert_eq!(sealed[0].len(), 2);
        assert!(assembler.is_empty());
    }

    #[test]
    fn assembler_splits_by_partition() {
        let mut assembler = BatchAssembler::new(10);
        assembler.push("events", message(0, 1));
        assembler.push("events", message(1, 1));
        assembler.push("events", message(0, 2));

        let mut batches = assembler.drain();
        batches.sort_by_key(MessageBatch::partition);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].partition(), 0);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].partition(), 1);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn assembler_seals_on_offset_regression() {
        let mut assembler = BatchAssembler::new(10);
        assembler.push("events", message(0, 5));
        assembler.push("events", message(0, 6));
        // A rewound offset closes the open run before starting a new one.
        let sealed = assembler.push("events", message(0, 5));
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].first_offset(), 5);
        assert_eq!(sealed[0].last_offset(), 6);

        let rest = assembler.drain();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].first_offset(), 5);
        assert_eq!(rest[0].len(), 1);
    }

    #[test]
    fn drain_clears_the_assembler() {
        let mut assembler = BatchAssembler::new(10);
        assembler.push("events", message(0, 1));
        assert!(!assembler.is_empty());
        assert_eq!(assembler.drain().len(), 1);
        assert!(assembler.is_empty());
        assert!(assembler.drain().is_empty());
    }
}
