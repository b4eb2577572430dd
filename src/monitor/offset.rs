//! Typed committed-offset values.
//!
//! librdkafka reports "no committed offset" as the raw sentinel `-1001`. That
//! value is decoded to [`OffsetValue::Missing`] at the ingress and never used
//! in arithmetic downstream.

use rdkafka::Offset;
use serde::{Deserialize, Serialize};

/// A committed or watermark offset as observed from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetValue {
    /// No offset has been recorded for the partition.
    Missing,
    /// A concrete offset, always `>= 0`.
    Valid(i64),
}

impl OffsetValue {
    /// Raw sentinel librdkafka uses for "no committed offset".
    pub const INVALID_RAW: i64 = -1001;

    /// Decode a raw broker offset. `-1001` and every other librdkafka
    /// sentinel (beginning, end, stored) map to `Missing`.
    pub fn from_raw(raw: i64) -> Self {
        if raw >= 0 {
            OffsetValue::Valid(raw)
        } else {
            OffsetValue::Missing
        }
    }

    /// Decode an rdkafka [`Offset`].
    pub fn from_kafka(offset: Offset) -> Self {
        match offset {
            Offset::Offset(raw) if raw >= 0 => OffsetValue::Valid(raw),
            _ => OffsetValue::Missing,
        }
    }

    /// Encode back to the raw representation. Inverse of [`OffsetValue::from_raw`]
    /// for valid offsets.
    pub fn to_raw(self) -> i64 {
        match self {
            OffsetValue::Valid(raw) => raw,
            OffsetValue::Missing => Self::INVALID_RAW,
        }
    }

    /// The concrete offset, if one was recorded.
    pub fn value(self) -> Option<i64> {
        match self {
            OffsetValue::Valid(raw) => Some(raw),
            OffsetValue::Missing => None,
        }
    }

    /// Whether no offset was recorded.
    pub fn is_missing(self) -> bool {
        matches!(self, OffsetValue::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_decodes_to_missing() {
        assert_eq!(OffsetValue::from_raw(-1001), OffsetValue::Missing);
        assert_eq!(OffsetValue::from_raw(-1), OffsetValue::Missing);
        assert_eq!(OffsetValue::from_raw(-2), OffsetValue::Missing);
    }

    #[test]
    fn non_negative_decodes_to_valid() {
        assert_eq!(OffsetValue::from_raw(0), OffsetValue::Valid(0));
        assert_eq!(OffsetValue::from_raw(42), OffsetValue::Valid(42));
    }

    #[test]
    fn raw_round_trip_on_valid_offsets() {
        for raw in [0, 1, 100, i64::MAX] {
            assert_eq!(OffsetValue::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(OffsetValue::Missing.to_raw(), OffsetValue::INVALID_RAW);
    }

    #[test]
    fn kafka_offsets_decode() {
        assert_eq!(
            OffsetValue::from_kafka(Offset::Offset(7)),
            OffsetValue::Valid(7)
        );
        assert_eq!(OffsetValue::from_kafka(Offset::Invalid), OffsetValue::Missing);
        assert_eq!(
            OffsetValue::from_kafka(Offset::Beginning),
            OffsetValue::Missing
        );
        assert_eq!(OffsetValue::from_kafka(Offset::End), OffsetValue::Missing);
        assert_eq!(OffsetValue::from_kafka(Offset::Stored), OffsetValue::Missing);
    }

    #[test]
    fn value_accessor() {
        assert_eq!(OffsetValue::Valid(3).value(), Some(3));
        assert_eq!(OffsetValue::Missing.value(), None);
        assert!(OffsetValue::Missing.is_missing());
        assert!(!OffsetValue::Valid(0).is_missing());
    }
}
