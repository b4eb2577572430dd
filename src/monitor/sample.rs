//! Per-partition progress snapshots.

use serde::{Deserialize, Serialize};

use crate::monitor::offset::OffsetValue;

/// One observation of a partition's consumer progress.
///
/// Lag derivation: when both the committed offset and high watermark are
/// known, lag is their difference. When the group has never committed, the
/// retained log length (`high - earliest`) stands in, so a brand-new group
/// does not report an enormous lag against offset zero. Anything else is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSample {
    /// Partition id within the monitored topic.
    pub partition: i32,
    /// Committed offset of the consumer group.
    pub consumer_offset: OffsetValue,
    /// Offset of the oldest retained message.
    pub earliest_offset: OffsetValue,
    /// Offset one past the newest visible message.
    pub high_watermark: OffsetValue,
    /// Derived lag in messages.
    pub lag: i64,
}

impl PartitionSample {
    /// Build a sample, deriving the lag from the three offsets.
    pub fn new(
        partition: i32,
        consumer_offset: OffsetValue,
        earliest_offset: OffsetValue,
        high_watermark: OffsetValue,
    ) -> Self {
        let lag = match (consumer_offset, high_watermark) {
            (OffsetValue::Valid(committed), OffsetValue::Valid(high)) => high - committed,
            (OffsetValue::Missing, OffsetValue::Valid(high)) => match earliest_offset {
                OffsetValue::Valid(earliest) => high - earliest,
                OffsetValue::Missing => 0,
            },
            _ => 0,
        };
        Self {
            partition,
            consumer_offset,
            earliest_offset,
            high_watermark,
            lag,
        }
    }
}

/// Sum of lags across one sampling tick.
pub fn total_lag(samples: &[PartitionSample]) -> i64 {
    samples.iter().map(|sample| sample.lag).sum()
}
