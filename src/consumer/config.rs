//! Consumer configuration structures.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Kafka consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Client identifier reported to the broker.
    pub client_id: String,

    /// Kafka broker addresses (comma-separated `host:port` or URI entries).
    pub brokers: String,

    /// Consumer group ID; names the durable offset cursor.
    pub group_id: String,

    /// Topics to consume from.
    pub topics: Vec<String>,

    /// Upper bound on the number of messages per dispatched batch.
    pub max_batch_size: usize,

    /// Offset reset policy (earliest, latest, none).
    pub auto_offset_reset: String,

    /// Emit librdkafka statistics and throughput counters at this cadence.
    pub statistics_interval: Option<Duration>,

    /// Cadence of the periodic offset commit.
    pub commit_interval: Duration,

    /// How long the poll loop holds a partial batch before sealing it.
    pub batch_linger: Duration,

    /// Number of concurrent handler invocations.
    pub num_workers: usize,

    /// Bound on queued-but-undispatched batches across all partitions.
    pub queue_capacity: usize,

    /// Session timeout in milliseconds.
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds.
    pub max_poll_interval_ms: u32,

    /// Additional Kafka properties passed straight through.
    pub kafka_properties: HashMap<String, String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            client_id: "kafka-lanes".to_string(),
            brokers: "localhost:9092".to_string(),
            group_id: "kafka-lanes".to_string(),
            topics: vec!["events".to_string()],
            max_batch_size: 100,
            auto_offset_reset: "earliest".to_string(),
            statistics_interval: None,
            commit_interval: Duration::from_secs(5),
            batch_linger: Duration::from_millis(100),
            num_workers: num_cpus::get(),
            queue_capacity: 64,
            session_timeout_ms: 30000,
            max_poll_interval_ms: 300000,
            kafka_properties: HashMap::new(),
        }
    }
}

impl ConsumerConfig {
    /// Create a new consumer config builder.
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// Called at consumer construction; a failure here is a programming or
    /// deployment error, not a runtime condition.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("client_id cannot be empty".to_string());
        }

        if self.group_id.is_empty() {
            return Err("group_id cannot be empty".to_string());
        }

        if self.topics.is_empty() {
            return Err("topics cannot be empty".to_string());
        }

        if self.topics.iter().any(String::is_empty) {
            return Err("topic names cannot be empty".to_string());
        }

        if self.brokers.is_empty() {
            return Err("brokers cannot be empty".to_string());
        }

        for entry in self.brokers.split(',') {
            let entry = entry.trim();
            if !broker_entry_is_valid(entry) {
                return Err(format!("invalid broker address '{entry}'"));
            }
        }

        if self.max_batch_size == 0 {
            return Err("max_batch_size must be greater than 0".to_string());
        }

        if self.num_workers == 0 {
            return Err("num_workers must be greater than 0".to_string());
        }

        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        if self.commit_interval.is_zero() {
            return Err("commit_interval must be greater than 0".to_string());
        }

        if self.batch_linger.is_zero() {
            return Err("batch_linger must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// A broker entry is either an absolute URI with a host, or a bare
/// `host:port` pair.
fn broker_entry_is_valid(entry: &str) -> bool {
    if entry.is_empty() {
        return false;
    }
    if let Ok(uri) = Url::parse(entry) {
        if uri.has_host() {
            return true;
        }
    }
    static HOST_PORT: OnceLock<Regex> = OnceLock::new();
    let pattern = HOST_PORT
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.\-]*:[0-9]{1,5}$").expect("static pattern"));
    pattern.is_match(entry)
}

/// Builder for [`ConsumerConfig`].
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    /// Create a builder seeded with defaults.
    pub fn new() -> Self {
        Self {
            config: ConsumerConfig::default(),
        }
    }

    /// Set the client identifier.
    pub fn client_id(mut self, client_id: String) -> Self {
        self.config.client_id = client_id;
        self
    }

    /// Set the broker addresses.
    pub fn brokers(mut self, brokers: String) -> Self {
        self.config.brokers = brokers;
        self
    }

    /// Set the consumer group ID.
    pub fn group_id(mut self, group_id: String) -> Self {
        self.config.group_id = group_id;
        self
    }

    /// Set the topics to consume.
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.config.topics = topics;
        self
    }

    /// Set the per-batch message bound.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    /// Set the offset reset policy.
    pub fn auto_offset_reset(mut self, policy: String) -> Self {
        self.config.auto_offset_reset = policy;
        self
    }

    /// Enable statistics reporting at the given cadence.
    pub fn statistics_interval(mut self, interval: Duration) -> Self {
        self.config.statistics_interval = Some(interval);
        self
    }

    /// Set the offset commit cadence.
    pub fn commit_interval(mut self, interval: Duration) -> Self {
        self.config.commit_interval = interval;
        self
    }

    /// Set how long a partial batch may linger before dispatch.
    pub fn batch_linger(mut self, linger: Duration) -> Self {
        self.config.batch_linger = linger;
        self
    }

    /// Set the worker pool size.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.config.num_workers = num_workers;
        self
    }

    /// Set the bound on queued batches.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Add a custom Kafka property.
    pub fn kafka_property(mut self, key: String, value: String) -> Self {
        self.config.kafka_properties.insert(key, value);
        self
    }

    /// Build the consumer configuration.
    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}

impl Default for ConsumerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
