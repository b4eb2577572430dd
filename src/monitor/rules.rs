//! Lag classification over a full sample window.
//!
//! Derived from the Burrow evaluation rules that a poll-based sampler can
//! support; the commit-timestamp rules are omitted because this sampler never
//! observes commit times.

use std::collections::BTreeMap;

use crate::monitor::offset::OffsetValue;
use crate::monitor::sample::PartitionSample;

/// Health classification for one partition over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionVerdict {
    /// The partition caught up at some point in the window.
    Ok,
    /// Offsets did not advance while lag stayed non-zero.
    Stalled {
        /// Lag at the end of the window.
        lag: i64,
    },
    /// Lag never decreased across the window.
    Lagging,
}

/// Classify every partition seen in the window.
///
/// Pure: the same window always yields the same verdicts. Per partition the
/// checks run in priority order and the first that fires wins: proof of life
/// (any zero-lag sample), then stall detection, then monotone lag growth.
pub fn classify(window: &[Vec<PartitionSample>]) -> BTreeMap<i32, PartitionVerdict> {
    let mut series: BTreeMap<i32, Vec<PartitionSample>> = BTreeMap::new();
    for tick in window {
        for sample in tick {
            series.entry(sample.partition).or_default().push(*sample);
        }
    }
    series
        .into_iter()
        .map(|(partition, samples)| (partition, classify_series(&samples)))
        .collect()
}

fn classify_series(series: &[PartitionSample]) -> PartitionVerdict {
    // Zero lag at any moment in the window is proof of life.
    if series.iter().any(|sample| sample.lag == 0) {
        return PartitionVerdict::Ok;
    }

    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return PartitionVerdict::Ok;
    };

    if offsets_indicate_lag(first.consumer_offset, last.consumer_offset) && last.lag != 0 {
        return PartitionVerdict::Stalled { lag: last.lag };
    }

    // A single decrease in lag anywhere in the window exonerates.
    let recovered = series
        .windows(2)
        .any(|pair| pair[1].lag < pair[0].lag);
    if !recovered {
        return PartitionVerdict::Lagging;
    }

    PartitionVerdict::Ok
}

/// Whether the committed offsets at the window edges describe a consumer
/// that is not making progress.
pub fn offsets_indicate_lag(first: OffsetValue, last: OffsetValue) -> bool {
    match (first, last) {
        (OffsetValue::Valid(a), OffsetValue::Valid(b)) => b - a <= 0,
        // First observation of the partition; judgement deferred to the next
        // window.
        (OffsetValue::Missing, OffsetValue::Valid(_)) => false,
        // A previously known offset disappeared.
        (OffsetValue::Valid(_), OffsetValue::Missing) => true,
        (OffsetValue::Missing, OffsetValue::Missing) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(partition: i32, committed: OffsetValue, high: i64) -> PartitionSample {
        PartitionSample::new(partition, committed, OffsetValue::Valid(0), OffsetValue::Valid(high))
    }

    #[test]
    fn offsets_indicate_lag_table() {
        use OffsetValue::{Missing, Valid};
        assert!(offsets_indicate_lag(Valid(100), Valid(100)));
        assert!(offsets_indicate_lag(Valid(100), Valid(90)));
        assert!(!offsets_indicate_lag(Valid(100), Valid(101)));
        assert!(!offsets_indicate_lag(Missing, Valid(5)));
        assert!(offsets_indicate_lag(Valid(5), Missing));
        assert!(offsets_indicate_lag(Missing, Missing));
    }

    #[test]
    fn zero_lag_sample_preempts_stall() {
        // Offsets frozen, lag non-zero at the edges, but one sample caught up.
        let window = vec![
            vec![sample(0, OffsetValue::Valid(100), 150)],
            vec![sample(0, OffsetValue::Valid(100), 100)],
            vec![sample(0, OffsetValue::Valid(100), 160)],
        ];
        assert_eq!(classify(&window)[&0], PartitionVerdict::Ok);
    }

    #[test]
    fn frozen_offsets_with_lag_stall() {
        let window = vec![
            vec![sample(0, OffsetValue::Valid(100), 130)],
            vec![sample(0, OffsetValue::Valid(100), 140)],
            vec![sample(0, OffsetValue::Valid(100), 150)],
        ];
        assert_eq!(classify(&window)[&0], PartitionVerdict::Stalled { lag: 50 });
    }

    #[test]
    fn stall_preempts_monotone_lag() {
        // Both conditions hold; the stall verdict carries the final lag.
        let window = vec![
            vec![sample(0, OffsetValue::Valid(10), 20)],
            vec![sample(0, OffsetValue::Valid(10), 30)],
        ];
        assert_eq!(classify(&window)[&0], PartitionVerdict::Stalled { lag: 20 });
    }

    #[test]
    fn advancing_but_never_recovering_lags() {
        let window = vec![
            vec![sample(0, OffsetValue::Valid(10), 110)],
            vec![sample(0, OffsetValue::Valid(20), 130)],
            vec![sample(0, OffsetValue::Valid(30), 150)],
        ];
        assert_eq!(classify(&window)[&0], PartitionVerdict::Lagging);
    }

    #[test]
    fn single_lag_decrease_exonerates() {
        let window = vec![
            vec![sample(0, OffsetValue::Valid(10), 110)],
            vec![sample(0, OffsetValue::Valid(20), 130)],
            vec![sample(0, OffsetValue::Valid(50), 140)],
            vec![sample(0, OffsetValue::Valid(55), 155)],
        ];
        // Lags run 100, 110, 90, 100: the one decrease clears the partition.
        assert_eq!(classify(&window)[&0], PartitionVerdict::Ok);
    }

    #[test]
    fn missing_to_valid_defers_judgement() {
        let window = vec![
            vec![sample(0, OffsetValue::Missing, 50)],
            vec![sample(0, OffsetValue::Valid(20), 60)],
            vec![sample(0, OffsetValue::Valid(30), 65)],
        ];
        // Not a stall (first observation), and lag decreased 50 -> 40.
        assert_eq!(classify(&window)[&0], PartitionVerdict::Ok);
    }

    #[test]
    fn never_seen_progress_stalls() {
        let window = vec![
            vec![sample(0, OffsetValue::Missing, 50)],
            vec![sample(0, OffsetValue::Missing, 60)],
        ];
        assert_eq!(classify(&window)[&0], PartitionVerdict::Stalled { lag: 60 });
    }

    #[test]
    fn partitions_are_classified_independently() {
        let window = vec![
            vec![
                sample(0, OffsetValue::Valid(10), 10),
                sample(1, OffsetValue::Valid(5), 30),
            ],
            vec![
                sample(0, OffsetValue::Valid(10), 10),
                sample(1, OffsetValue::Valid(5), 40),
            ],
        ];
        let verdicts = classify(&window);
        assert_eq!(verdicts[&0], PartitionVerdict::Ok);
        assert_eq!(verdicts[&1], PartitionVerdict::Stalled { lag: 35 });
    }

    #[test]
    fn classification_is_pure() {
        let window = vec![
            vec![sample(0, OffsetValue::Valid(10), 110)],
            vec![sample(0, OffsetValue::Valid(20), 130)],
        ];
        assert_eq!(classify(&window), classify(&window));
    }

    #[test]
    fn empty_window_yields_no_verdicts() {
        assert!(classify(&[]).is_empty());
        assert!(classify(&[vec![]]).is_empty());
    }
}
