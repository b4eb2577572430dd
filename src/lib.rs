//! Client-side Kafka coordination layer.
//!
//! Two subsystems built atop [rdkafka]:
//!
//! - a **batched consumer** that groups polled messages by partition into
//!   bounded batches and dispatches them to a user handler, serializing work
//!   within a partition while running partitions concurrently, and
//!   committing offsets only for acknowledged work;
//! - a **lag monitor** that periodically samples committed offsets and
//!   watermarks, keeps a sliding window of those samples, and classifies
//!   each partition as healthy, stalled, or steadily lagging.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use kafka_lanes::{BatchConsumer, BatchHandler, ConsumerConfig, ConsumerHandle, MessageBatch};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl BatchHandler for Printer {
//!     type Error = std::io::Error;
//!
//!     async fn handle(
//!         &self,
//!         _consumer: &ConsumerHandle,
//!         batch: MessageBatch,
//!     ) -> Result<(), Self::Error> {
//!         println!("partition {}: {} messages", batch.partition(), batch.len());
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), kafka_lanes::ConsumerError> {
//! let config = ConsumerConfig::builder()
//!     .brokers("localhost:9092".to_string())
//!     .group_id("printer".to_string())
//!     .topics(vec!["events".to_string()])
//!     .build();
//!
//! let handle = BatchConsumer::start(config, Printer).await?;
//! handle.await_completion().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [rdkafka]: https://docs.rs/rdkafka

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

/// Batched, partition-serialized consumer.
pub mod consumer;

/// Consumer lag monitoring.
pub mod monitor;

pub use consumer::{
    BatchConsumer, BatchHandler, BatchMessage, ConsumerConfig, ConsumerError, ConsumerHandle,
    ConsumerResult, ConsumerState, MessageBatch,
};
pub use monitor::{LagMonitor, MonitorConfig, OffsetValue, PartitionSample, PartitionVerdict};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with default settings.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
