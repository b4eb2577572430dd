//! Consumer lag monitoring.
//!
//! A [`LagMonitor`] periodically samples committed offsets, earliest
//! offsets, and high watermarks for every partition a consumer is assigned,
//! keeps a fixed-size window of those samples, and classifies each partition
//! as healthy, stalled, or steadily lagging once the window fills.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kafka_lanes::monitor::{LagMonitor, MonitorConfig, run_until_complete};
//! # async fn example(handle: kafka_lanes::consumer::ConsumerHandle) -> Result<(), kafka_lanes::consumer::ConsumerError> {
//! let monitor = LagMonitor::new(
//!     &handle,
//!     "orders",
//!     MonitorConfig::default(),
//!     Arc::new(|verdicts| {
//!         for (partition, verdict) in verdicts {
//!             tracing::warn!(partition, ?verdict, "lag verdict");
//!         }
//!     }),
//! )?;
//! run_until_complete(&handle, monitor).await?;
//! # Ok(())
//! # }
//! ```

pub mod monitor;
pub mod offset;
pub mod rules;
pub mod sample;
pub mod sampler;
pub mod window;

pub use monitor::{run_until_complete, LagMonitor, MonitorConfig, VerdictSink};
pub use offset::OffsetValue;
pub use rules::{classify, offsets_indicate_lag, PartitionVerdict};
pub use sample::{total_lag, PartitionSample};
pub use sampler::ProgressSampler;
pub use window::SampleWindow;
