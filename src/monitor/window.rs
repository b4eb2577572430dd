//! Fixed-capacity window of progress samples.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::monitor::sample::PartitionSample;

/// Sliding window holding the last `capacity` sampling ticks.
///
/// Classification is meaningless over short windows, so [`SampleWindow::snapshot_if_full`]
/// returns nothing until the window has filled; an empty snapshot doubles as
/// the "not enough data yet" signal. All mutation happens under a single
/// mutex; the sampling cadence is seconds, so the lock is uncontended.
#[derive(Debug)]
pub struct SampleWindow {
    capacity: usize,
    inner: Mutex<VecDeque<Vec<PartitionSample>>>,
}

impl SampleWindow {
    /// Create a window retaining `capacity` ticks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append the newest tick, evicting the oldest once at capacity.
    pub fn push(&self, samples: Vec<PartitionSample>) {
        let mut entries = self.inner.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(samples);
    }

    /// Copy of all ticks in insertion order, but only once the window is
    /// full; an empty vector otherwise.
    pub fn snapshot_if_full(&self) -> Vec<Vec<PartitionSample>> {
        let entries = self.inner.lock();
        if entries.len() < self.capacity {
            return Vec::new();
        }
        entries.iter().cloned().collect()
    }

    /// Discard every tick, e.g. after a rebalance changed the observed
    /// partition set.
    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    /// Number of ticks currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no ticks are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
