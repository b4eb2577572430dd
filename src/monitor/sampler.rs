//! Broker-side progress sampling.

use std::sync::Arc;

use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, TopicPartitionList};
use tracing::debug;

use crate::consumer::config::ConsumerConfig;
use crate::consumer::context::LaneContext;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::monitor::monitor::MonitorConfig;
use crate::monitor::offset::OffsetValue;
use crate::monitor::sample::PartitionSample;

/// Samples committed, earliest, and high-watermark offsets for every
/// partition of one topic the consumer is assigned.
///
/// The sampler only inspects state: it never joins the consumer group. Each
/// query blocks the calling task for the duration of the broker round-trip,
/// bounded by the configured timeouts.
pub struct ProgressSampler {
    consumer: Arc<StreamConsumer<LaneContext>>,
    admin: AdminClient<DefaultClientContext>,
    topic: String,
    config: MonitorConfig,
}

impl ProgressSampler {
    /// Build a sampler sharing the dispatcher's consumer plus a dedicated
    /// admin client for the metadata fallback.
    pub(crate) fn new(
        consumer: Arc<StreamConsumer<LaneContext>>,
        consumer_config: &ConsumerConfig,
        config: MonitorConfig,
        topic: String,
    ) -> ConsumerResult<Self> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &consumer_config.brokers)
            .set("client.id", format!("{}-monitor", consumer_config.client_id))
            .create()
            .map_err(|e| ConsumerError::Connection(format!("failed to create admin client: {e}")))?;
        Ok(Self {
            consumer,
            admin,
            topic,
            config,
        })
    }

    /// Take one sample of every partition. Partitions whose committed-offset
    /// lookup failed are skipped for this window.
    pub fn sample(&self) -> ConsumerResult<Vec<PartitionSample>> {
        let partitions = self.partitions_for_topic()?;
        if partitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut list = TopicPartitionList::new();
        for partition in &partitions {
            list.add_partition(&self.topic, *partition);
        }
        let committed = self
            .consumer
            .committed_offsets(list, self.config.committed_timeout)?;

        let mut samples = Vec::with_capacity(partitions.len());
        for elem in committed.elements() {
            if elem.topic() != self.topic {
                continue;
            }
            let partition = elem.partition();
            if let Err(error) = elem.error() {
                debug!(
                    topic = %self.topic,
                    partition,
                    error = %error,
                    "committed offset unavailable; skipping partition this window"
                );
                continue;
            }
            let consumer_offset = OffsetValue::from_kafka(elem.offset());
            let (low, high) = self.consumer.fetch_watermarks(
                &self.topic,
                partition,
                self.config.watermark_timeout,
            )?;
            samples.push(PartitionSample::new(
                partition,
                consumer_offset,
                OffsetValue::from_raw(low),
                OffsetValue::from_raw(high),
            ));
        }
        Ok(samples)
    }

    /// The consumer's assigned partitions for the topic, falling back to the
    /// topic's full partition list from broker metadata when nothing is
    /// assigned yet.
    fn partitions_for_topic(&self) -> ConsumerResult<Vec<i32>> {
        let assignment = self.consumer.assignment()?;
        let mut partitions: Vec<i32> = assignment
            .elements()
            .iter()
            .filter(|elem| elem.topic() == self.topic)
            .map(|elem| elem.partition())
            .collect();

        if partitions.is_empty() {
            let metadata = self
                .admin
                .inner()
                .fetch_metadata(Some(self.topic.as_str()), self.config.metadata_timeout)?;
            partitions = metadata
                .topics()
                .iter()
                .filter(|topic| topic.name() == self.topic)
                .flat_map(|topic| topic.partitions().iter().map(|p| p.id()))
                .collect();
        }

        partitions.sort_unstable();
        Ok(partitions)
    }
}
