//! Periodic lag monitoring loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::consumer::dispatcher::ConsumerHandle;
use crate::consumer::error::ConsumerResult;
use crate::monitor::rules::{classify, PartitionVerdict};
use crate::monitor::sample::{total_lag, PartitionSample};
use crate::monitor::sampler::ProgressSampler;
use crate::monitor::window::SampleWindow;

/// Lag monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sampling cadence.
    pub poll_interval: Duration,
    /// Number of ticks a window must hold before verdicts are produced.
    pub window_size: usize,
    /// Consecutive sampler failures tolerated before the loop re-raises.
    pub max_consecutive_failures: u32,
    /// Bound on the committed-offset query.
    pub committed_timeout: Duration,
    /// Bound on each watermark query.
    pub watermark_timeout: Duration,
    /// Bound on the metadata fallback query.
    pub metadata_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            window_size: 60,
            max_consecutive_failures: 3,
            committed_timeout: Duration::from_secs(20),
            watermark_timeout: Duration::from_secs(40),
            metadata_timeout: Duration::from_secs(10),
        }
    }
}

/// Callback receiving the per-partition verdicts of each full window.
pub type VerdictSink = Arc<dyn Fn(&BTreeMap<i32, PartitionVerdict>) + Send + Sync>;

/// Watches one `(consumer, topic, group)` triple.
///
/// Each tick samples broker offsets, appends to the window, and once the
/// window is full runs classification and hands the verdicts to the sink.
/// Verdicts are observations for alerting; they never stop the consumer.
pub struct LagMonitor {
    sampler: ProgressSampler,
    window: SampleWindow,
    config: MonitorConfig,
    group_id: String,
    topic: String,
    assignments: broadcast::Receiver<crate::consumer::context::AssignmentEvent>,
    verdict_sink: VerdictSink,
}

impl LagMonitor {
    /// Attach a monitor to a running consumer for one of its topics.
    pub fn new(
        handle: &ConsumerHandle,
        topic: impl Into<String>,
        config: MonitorConfig,
        verdict_sink: VerdictSink,
    ) -> ConsumerResult<Self> {
        let topic = topic.into();
        let consumer_config = handle.config();
        let sampler = ProgressSampler::new(
            handle.kafka_consumer(),
            consumer_config,
            config.clone(),
            topic.clone(),
        )?;
        Ok(Self {
            sampler,
            window: SampleWindow::new(config.window_size),
            group_id: consumer_config.group_id.clone(),
            topic,
            assignments: handle.assignment_events(),
            config,
            verdict_sink,
        })
    }

    /// Run until the surrounding composition cancels the future, or until
    /// the sampler fails `max_consecutive_failures` times in a row, in which
    /// case the last failure is re-raised.
    pub async fn run(mut self) -> ConsumerResult<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;
        let mut assignments_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sampler.sample() {
                        Ok(samples) => {
                            consecutive_failures = 0;
                            self.observe(samples);
                        }
                        Err(error) => {
                            consecutive_failures += 1;
                            warn!(
                                group = %self.group_id,
                                topic = %self.topic,
                                failures = consecutive_failures,
                                error = %error,
                                "progress sampling failed"
                            );
                            if consecutive_failures >= self.config.max_consecutive_failures {
                                return Err(error);
                            }
                        }
                    }
                }
                event = self.assignments.recv(), if assignments_open => match event {
                    Ok(event) if event.mentions_topic(&self.topic) => {
                        // Mixing samples across assignments would yield
                        // spurious verdicts.
                        debug!(topic = %self.topic, "assignment changed; resetting sample window");
                        self.window.reset();
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed assignment events; resetting sample window");
                        self.window.reset();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        assignments_open = false;
                    }
                },
            }
        }
    }

    fn observe(&self, samples: Vec<PartitionSample>) {
        for sample in &samples {
            info!(
                group = %self.group_id,
                topic = %self.topic,
                partition = sample.partition,
                high_watermark = sample.high_watermark.to_raw(),
                consumer_offset = sample.consumer_offset.to_raw(),
                "partition progress"
            );
        }
        info!(
            group = %self.group_id,
            topic = %self.topic,
            lag = total_lag(&samples),
            "aggregate consumer lag"
        );

        self.window.push(samples);
        let window = self.window.snapshot_if_full();
        if !window.is_empty() {
            let verdicts = classify(&window);
            (self.verdict_sink)(&verdicts);
        }
    }
}

/// Drive a consumer and its monitor together: the composition finishes with
/// whichever completes first, stopping the other.
pub async fn run_until_complete(handle: &ConsumerHandle, monitor: LagMonitor) -> ConsumerResult<()> {
    tokio::select! {
        result = handle.await_completion() => result,
        result = monitor.run() => {
            handle.stop();
            result
        }
    }
}
