//! Per-partition dispatch queues.

use std::collections::{BTreeMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::consumer::batch::MessageBatch;

type Lane = (String, i32);

/// FIFO batch queues with at-most-one in-flight batch per partition.
///
/// [`PartitionScheduler::pop_ready`] marks a partition in-flight while its head batch is being
/// handled; the scheduler never hands out a second batch for that partition
/// until [`PartitionScheduler::complete`] clears the mark. Selection rotates across ready
/// partitions so a single busy partition cannot starve the rest.
#[derive(Debug, Default)]
pub(crate) struct PartitionScheduler {
    inner: Mutex<SchedulerState>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    queues: BTreeMap<Lane, VecDeque<MessageBatch>>,
    in_flight: HashSet<Lane>,
    last_dispatched: Option<Lane>,
}

impl PartitionScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a batch to its partition's queue.
    pub(crate) fn enqueue(&self, batch: MessageBatch) {
        let mut state = self.inner.lock();
        let key = (batch.topic().to_string(), batch.partition());
        state.queues.entry(key).or_default().push_back(batch);
    }

    /// Take the head batch of the next ready partition, marking it in-flight.
    pub(crate) fn pop_ready(&self) -> Option<MessageBatch> {
        let mut state = self.inner.lock();

        let ready: Vec<Lane> = state
            .queues
            .iter()
            .filter(|(lane, queue)| !queue.is_empty() && !state.in_flight.contains(*lane))
            .map(|(lane, _)| lane.clone())
            .collect();
        if ready.is_empty() {
            return None;
        }

        let pick = match &state.last_dispatched {
            Some(last) => ready
                .iter()
                .find(|lane| *lane > last)
                .unwrap_or(&ready[0])
                .clone(),
            None => ready[0].clone(),
        };

        let batch = state.queues.get_mut(&pick)?.pop_front()?;
        if state.queues.get(&pick).is_some_and(VecDeque::is_empty) {
            state.queues.remove(&pick);
        }
        state.in_flight.insert(pick.clone());
        state.last_dispatched = Some(pick);
        Some(batch)
    }

    /// Clear a partition's in-flight mark after its handler finished.
    pub(crate) fn complete(&self, topic: &str, partition: i32) {
        let mut state = self.inner.lock();
        state.in_flight.remove(&(topic.to_string(), partition));
    }

    /// Drop every queued-but-undispatched batch; returns how many were
    /// discarded. In-flight marks are untouched.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut state = self.inner.lock();
        let discarded = state.queues.values().map(VecDeque::len).sum();
        state.queues.clear();
        discarded
    }

    /// Number of partitions currently being handled.
    pub(crate) fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Number of queued-but-undispatched batches.
    #[cfg(test)]
    pub(crate) fn queued_batches(&self) -> usize {
        self.inner.lock().queues.values().map(VecDeque::len).sum()
    }
}
