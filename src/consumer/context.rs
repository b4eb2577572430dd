//! rdkafka client context publishing partition-assignment changes.

use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::ClientContext;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Partitions mentioned by a rebalance callback.
#[derive(Debug, Clone)]
pub struct AssignmentEvent {
    /// `(topic, partition)` pairs in the new assignment or revocation.
    pub partitions: Vec<(String, i32)>,
}

impl AssignmentEvent {
    /// Whether any mentioned partition belongs to `topic`.
    pub fn mentions_topic(&self, topic: &str) -> bool {
        self.partitions.iter().any(|(t, _)| t == topic)
    }
}

/// Client context that forwards rebalance events to observers.
///
/// The lag monitor resets its sample window on these events: mixing samples
/// from different assignments would produce spurious verdicts.
pub struct LaneContext {
    assignments: broadcast::Sender<AssignmentEvent>,
}

impl LaneContext {
    pub(crate) fn new() -> Self {
        let (assignments, _) = broadcast::channel(16);
        Self { assignments }
    }

    /// Subscribe to assignment changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AssignmentEvent> {
        self.assignments.subscribe()
    }
}

impl ClientContext for LaneContext {}

impl ConsumerContext for LaneContext {
    fn post_rebalance(&self, rebalance: &Rebalance) {
        let partitions: Vec<(String, i32)> = match rebalance {
            Rebalance::Assign(list) | Rebalance::Revoke(list) => list
                .elements()
                .iter()
                .map(|elem| (elem.topic().to_string(), elem.partition()))
                .collect(),
            Rebalance::Error(error) => {
                warn!(error = %error, "rebalance failed");
                return;
            }
        };
        debug!(?partitions, "partition assignment changed");
        // No receivers is fine; the monitor may not be attached.
        let _ = self.assignments.send(AssignmentEvent { partitions });
    }
}
