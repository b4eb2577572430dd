//! Dispatcher throughput counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters reported at the configured statistics cadence.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    messages_polled: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_completed: AtomicU64,
    messages_handled: AtomicU64,
    handler_failures: AtomicU64,
    commit_cycles: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages read off the broker stream.
    pub messages_polled: u64,
    /// Batches handed to workers.
    pub batches_dispatched: u64,
    /// Batches whose handler completed successfully.
    pub batches_completed: u64,
    /// Messages inside completed batches.
    pub messages_handled: u64,
    /// Batches whose handler failed.
    pub handler_failures: u64,
    /// Successful commit cycles with at least one partition.
    pub commit_cycles: u64,
}

impl ConsumerStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_polled(&self) {
        self.messages_polled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self, messages: usize) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        self.messages_handled
            .fetch_add(messages as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit_cycle(&self) {
        self.commit_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_polled: self.messages_polled.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            commit_cycles: self.commit_cycles.load(Ordering::Relaxed),
        }
    }
}
