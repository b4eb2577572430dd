//! Batched, partition-serialized consumer dispatcher.
//!
//! A poll task drains the broker stream into per-partition queues, a
//! dispatch task hands head batches to a bounded worker pool (never two
//! batches from one partition at once), and completions advance the commit
//! cursor that a committer task flushes to the broker.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tokio::sync::{broadcast, watch, Notify, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::consumer::batch::{BatchAssembler, BatchMessage, MessageBatch};
use crate::consumer::config::ConsumerConfig;
use crate::consumer::context::{AssignmentEvent, LaneContext};
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::handler::BatchHandler;
use crate::consumer::offsets::CommitTracker;
use crate::consumer::scheduler::PartitionScheduler;
use crate::consumer::shutdown::{ConsumerState, Lifecycle};
use crate::consumer::stats::ConsumerStats;

/// Consecutive poll errors tolerated before the consumer faults. librdkafka
/// retries transient conditions internally; a run of this length means its
/// budget is exhausted.
const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 10;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Entry point for starting a batched consumer.
pub struct BatchConsumer;

impl BatchConsumer {
    /// Build the underlying Kafka consumer, subscribe, and launch the
    /// dispatch tasks. Returns a handle for controlling the instance.
    ///
    /// Configuration problems are surfaced here as
    /// [`ConsumerError::Config`]; they are not recoverable at runtime.
    pub async fn start<H: BatchHandler>(
        config: ConsumerConfig,
        handler: H,
    ) -> ConsumerResult<ConsumerHandle> {
        config.validate().map_err(ConsumerError::Config)?;

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                config.max_poll_interval_ms.to_string(),
            )
            .set("auto.offset.reset", &config.auto_offset_reset);
        if let Some(interval) = config.statistics_interval {
            client_config.set("statistics.interval.ms", interval.as_millis().to_string());
        }
        for (key, value) in &config.kafka_properties {
            client_config.set(key, value);
        }

        let consumer: StreamConsumer<LaneContext> = client_config
            .create_with_context(LaneContext::new())
            .map_err(|e| ConsumerError::Connection(format!("failed to create consumer: {e}")))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| ConsumerError::Connection(format!("failed to subscribe: {e}")))?;
        info!(group = %config.group_id, topics = ?config.topics, "subscribed");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let statistics_interval = config.statistics_interval;
        let shared = Arc::new(Shared {
            config,
            consumer: Arc::new(consumer),
            scheduler: PartitionScheduler::new(),
            commits: CommitTracker::new(),
            lifecycle: Lifecycle::new(),
            stats: Arc::new(ConsumerStats::new()),
            work_signal: Notify::new(),
            shutdown_tx,
            shutdown_rx,
            fault: Mutex::new(None),
        });
        let worker_slots = Arc::new(Semaphore::new(shared.config.num_workers));
        let queue_slots = Arc::new(Semaphore::new(shared.config.queue_capacity));

        shared.lifecycle.advance(ConsumerState::Running);

        let handle = ConsumerHandle {
            shared: shared.clone(),
        };
        let handler = Arc::new(handler);

        tokio::spawn(poll_loop(shared.clone(), queue_slots.clone()));
        tokio::spawn(dispatch_loop(
            shared.clone(),
            handler,
            handle.clone(),
            worker_slots,
            queue_slots.clone(),
        ));
        tokio::spawn(commit_loop(shared.clone()));
        tokio::spawn(drain_loop(shared.clone(), queue_slots));
        if statistics_interval.is_some() {
            tokio::spawn(stats_loop(shared.clone()));
        }

        Ok(handle)
    }
}

/// Cloneable control surface for a running consumer.
#[derive(Clone)]
pub struct ConsumerHandle {
    shared: Arc<Shared>,
}

impl ConsumerHandle {
    /// Request a graceful drain: polling stops, queued-but-undispatched
    /// batches are discarded, in-flight batches are awaited, and the
    /// acknowledged offsets get a final commit.
    pub fn stop(&self) {
        let _ = self.shared.shutdown_tx.send(true);
    }

    /// Arm a timer that calls [`ConsumerHandle::stop`] once after `delay`.
    pub fn stop_after(&self, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.stop();
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        self.shared.lifecycle.state()
    }

    /// Wait until the consumer has fully drained. Surfaces the first fatal
    /// handler failure, with its identity preserved for downcasting.
    pub async fn await_completion(&self) -> ConsumerResult<()> {
        let mut states = self.shared.lifecycle.watch();
        loop {
            let state = *states.borrow_and_update();
            match state {
                ConsumerState::Completed => return Ok(()),
                ConsumerState::Faulted => {
                    let fault = self.shared.fault.lock().clone();
                    return Err(fault.unwrap_or_else(|| {
                        ConsumerError::Shutdown("consumer faulted".to_string())
                    }));
                }
                _ => {}
            }
            if states.changed().await.is_err() {
                return Err(ConsumerError::Shutdown(
                    "consumer terminated without reaching a final state".to_string(),
                ));
            }
        }
    }

    /// Subscribe to partition-assignment events (the lag monitor resets its
    /// window on them).
    pub fn assignment_events(&self) -> broadcast::Receiver<AssignmentEvent> {
        self.shared.consumer.context().subscribe()
    }

    /// Throughput counters for this instance.
    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.shared.stats.clone()
    }

    pub(crate) fn config(&self) -> &ConsumerConfig {
        &self.shared.config
    }

    /// The underlying client, shared with the monitor's sampler through
    /// librdkafka's thread-safe surface.
    pub(crate) fn kafka_consumer(&self) -> Arc<StreamConsumer<LaneContext>> {
        self.shared.consumer.clone()
    }
}

struct Shared {
    config: ConsumerConfig,
    consumer: Arc<StreamConsumer<LaneContext>>,
    scheduler: PartitionScheduler,
    commits: CommitTracker,
    lifecycle: Lifecycle,
    stats: Arc<ConsumerStats>,
    work_signal: Notify,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    fault: Mutex<Option<ConsumerError>>,
}

impl Shared {
    /// Record the first fault and trigger the drain path.
    fn record_fault(&self, error: ConsumerError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(error);
        }
        drop(fault);
        let _ = self.shutdown_tx.send(true);
    }
}

/// Drain the broker stream into bounded partition-homogeneous batches.
async fn poll_loop(shared: Arc<Shared>, queue_slots: Arc<Semaphore>) {
    let mut shutdown = shared.shutdown_rx.clone();
    let mut assembler = BatchAssembler::new(shared.config.max_batch_size);
    // interval() fires immediately; the linger tick must not, or the first
    // message of a run would always ship as a batch of one.
    let mut linger = tokio::time::interval_at(
        tokio::time::Instant::now() + shared.config.batch_linger,
        shared.config.batch_linger,
    );
    linger.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_errors = 0u32;
    let mut stream = shared.consumer.stream();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = stream.next() => match message {
                Some(Ok(message)) => {
                    consecutive_errors = 0;
                    shared.stats.record_polled();
                    let topic = message.topic().to_string();
                    let decoded = BatchMessage::from_kafka(&message);
                    drop(message);
                    for batch in assembler.push(&topic, decoded) {
                        if !enqueue(&shared, &queue_slots, batch, &mut shutdown).await {
                            return;
                        }
                    }
                }
                Some(Err(error)) => {
                    consecutive_errors += 1;
                    warn!(error = %error, consecutive_errors, "poll error");
                    if consecutive_errors >= MAX_CONSECUTIVE_POLL_ERRORS {
                        error!("poll error budget exhausted; faulting consumer");
                        shared.record_fault(ConsumerError::from(error));
                        return;
                    }
                }
                None => break,
            },
            _ = linger.tick(), if !assembler.is_empty() => {
                for batch in assembler.drain() {
                    if !enqueue(&shared, &queue_slots, batch, &mut shutdown).await {
                        return;
                    }
                }
            }
        }
    }
    debug!("poll loop exited");
}

/// Queue a sealed batch, blocking while every queue slot is taken. Returns
/// false when shutdown interrupted the wait.
async fn enqueue(
    shared: &Arc<Shared>,
    queue_slots: &Arc<Semaphore>,
    batch: MessageBatch,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        permit = queue_slots.clone().acquire_owned() => {
            match permit {
                // Released by the worker or the drain task, not by drop.
                Ok(permit) => permit.forget(),
                Err(_) => return false,
            }
            shared.scheduler.enqueue(batch);
            shared.work_signal.notify_one();
            true
        }
        _ = shutdown.changed() => false,
    }
}

/// Hand ready batches to the worker pool.
async fn dispatch_loop<H: BatchHandler>(
    shared: Arc<Shared>,
    handler: Arc<H>,
    handle: ConsumerHandle,
    worker_slots: Arc<Semaphore>,
    queue_slots: Arc<Semaphore>,
) {
    let mut shutdown = shared.shutdown_rx.clone();

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Hold a worker slot before selecting a batch so the batch starts
        // the moment it is popped.
        let permit = tokio::select! {
            permit = worker_slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.changed() => break,
        };

        let Some(batch) = shared.scheduler.pop_ready() else {
            drop(permit);
            tokio::select! {
                _ = shared.work_signal.notified() => {}
                _ = shutdown.changed() => break,
            }
            continue;
        };

        shared.stats.record_dispatched();
        let shared = shared.clone();
        let handler = handler.clone();
        let handle = handle.clone();
        let queue_slots = queue_slots.clone();
        tokio::spawn(async move {
            run_batch(&shared, handler.as_ref(), &handle, batch).await;
            queue_slots.add_permits(1);
            shared.work_signal.notify_one();
            drop(permit);
        });
    }
    debug!("dispatch loop exited");
}

/// Invoke the handler for one batch and settle its outcome.
async fn run_batch<H: BatchHandler>(
    shared: &Shared,
    handler: &H,
    handle: &ConsumerHandle,
    batch: MessageBatch,
) {
    let topic = batch.topic().to_string();
    let partition = batch.partition();
    let next_offset = batch.last_offset() + 1;
    let messages = batch.len();

    match handler.handle(handle, batch).await {
        Ok(()) => {
            // Only an acknowledged batch may move the commit cursor.
            shared.commits.record(&topic, partition, next_offset).await;
            shared.stats.record_completed(messages);
        }
        Err(error) => {
            error!(topic = %topic, partition, error = %error, "batch handler failed; faulting consumer");
            shared.stats.record_handler_failure();
            shared.record_fault(ConsumerError::handler(error));
        }
    }

    shared.scheduler.complete(&topic, partition);
}

/// Periodically flush acknowledged offsets to the broker.
async fn commit_loop(shared: Arc<Shared>) {
    let mut shutdown = shared.shutdown_rx.clone();
    let mut ticker = tokio::time::interval(shared.config.commit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match shared.commits.commit(shared.consumer.as_ref()).await {
                    Ok(0) => {}
                    Ok(partitions) => {
                        shared.stats.record_commit_cycle();
                        debug!(partitions, "offsets committed");
                    }
                    Err(error) => warn!(error = %error, "offset commit failed; will retry"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("commit loop exited");
}

/// Finish the instance once a stop or fault was signalled: discard
/// undispatched work, await in-flight handlers, make the final commit, and
/// publish the terminal state.
async fn drain_loop(shared: Arc<Shared>, queue_slots: Arc<Semaphore>) {
    let mut shutdown = shared.shutdown_rx.clone();
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    shared.lifecycle.advance(ConsumerState::Draining);

    let discarded = shared.scheduler.discard_pending();
    if discarded > 0 {
        queue_slots.add_permits(discarded);
        debug!(batches = discarded, "discarded undispatched batches");
    }

    // In-flight handler invocations are awaited, never cancelled.
    while shared.scheduler.in_flight_count() > 0 {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    // A batch enqueued concurrently with the first discard can slip in; it
    // was never dispatched, so it is discarded like the rest.
    let late = shared.scheduler.discard_pending();
    if late > 0 {
        queue_slots.add_permits(late);
    }

    match shared.commits.commit(shared.consumer.as_ref()).await {
        Ok(0) => {}
        Ok(partitions) => info!(partitions, "final offsets committed"),
        Err(error) => error!(error = %error, "final offset commit failed"),
    }

    shared.consumer.unsubscribe();

    let faulted = shared.fault.lock().is_some();
    shared.lifecycle.advance(if faulted {
        ConsumerState::Faulted
    } else {
        ConsumerState::Completed
    });
    info!(state = ?shared.lifecycle.state(), "consumer drained");
}

/// Log throughput counters at the configured cadence.
async fn stats_loop(shared: Arc<Shared>) {
    let Some(interval) = shared.config.statistics_interval else {
        return;
    };
    let mut shutdown = shared.shutdown_rx.clone();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = shared.stats.snapshot();
                info!(
                    group = %shared.config.group_id,
                    polled = snapshot.messages_polled,
                    dispatched = snapshot.batches_dispatched,
                    completed = snapshot.batches_completed,
                    handled = snapshot.messages_handled,
                    failures = snapshot.handler_failures,
                    "consumer throughput"
                );
            }
            _ = shutdown.changed() => break,
        }
    }
}
