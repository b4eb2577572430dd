//! Batched, partition-serialized Kafka consumer.
//!
//! The dispatcher polls the broker, groups messages into bounded
//! partition-homogeneous batches, and invokes the user handler with a strict
//! per-partition serialization guarantee while running distinct partitions
//! concurrently. Offsets are committed only for batches the handler
//! acknowledged, giving at-least-once delivery.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use kafka_lanes::consumer::{
//!     BatchConsumer, BatchHandler, ConsumerConfig, ConsumerHandle, MessageBatch,
//! };
//!
//! struct Indexer;
//!
//! #[async_trait]
//! impl BatchHandler for Indexer {
//!     type Error = std::io::Error;
//!
//!     async fn handle(
//!         &self,
//!         _consumer: &ConsumerHandle,
//!         batch: MessageBatch,
//!     ) -> Result<(), Self::Error> {
//!         for message in batch.messages() {
//!             // index message.payload ...
//!             let _ = message.offset;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), kafka_lanes::consumer::ConsumerError> {
//! let config = ConsumerConfig::builder()
//!     .brokers("localhost:9092".to_string())
//!     .group_id("indexer".to_string())
//!     .topics(vec!["orders".to_string()])
//!     .max_batch_size(50)
//!     .build();
//!
//! let handle = BatchConsumer::start(config, Indexer).await?;
//! handle.await_completion().await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod offsets;
pub(crate) mod scheduler;
pub mod shutdown;
pub mod stats;

pub use batch::{BatchMessage, MessageBatch};
pub use config::{ConsumerConfig, ConsumerConfigBuilder};
pub use context::{AssignmentEvent, LaneContext};
pub use dispatcher::{BatchConsumer, ConsumerHandle};
pub use error::{ConsumerError, ConsumerResult, ErrorSeverity};
pub use handler::BatchHandler;
pub use offsets::CommitTracker;
pub use shutdown::ConsumerState;
pub use stats::{ConsumerStats, StatsSnapshot};
