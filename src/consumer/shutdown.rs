//! Consumer lifecycle state.

use tokio::sync::watch;

/// Externally observable consumer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Constructed but not yet polling.
    Stopped,
    /// Polling and dispatching batches.
    Running,
    /// Stop requested; in-flight batches are being awaited.
    Draining,
    /// Drained cleanly; acknowledged offsets were committed.
    Completed,
    /// A handler failure or escalated broker error ended the consumer.
    Faulted,
}

impl ConsumerState {
    /// Whether the consumer has finished for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConsumerState::Completed | ConsumerState::Faulted)
    }
}

/// Watchable lifecycle cell. Terminal states are sticky.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    tx: watch::Sender<ConsumerState>,
    rx: watch::Receiver<ConsumerState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, rx) = watch::channel(ConsumerState::Stopped);
        Self { tx, rx }
    }

    /// Move to `next` unless a terminal state was already reached.
    pub(crate) fn advance(&self, next: ConsumerState) {
        self.tx.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    pub(crate) fn state(&self) -> ConsumerState {
        *self.rx.borrow()
    }

    /// A receiver for awaiting state changes.
    pub(crate) fn watch(&self) -> watch::Receiver<ConsumerState> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_in_order() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ConsumerState::Stopped);

        lifecycle.advance(ConsumerState::Running);
        assert_eq!(lifecycle.state(), ConsumerState::Running);

        lifecycle.advance(ConsumerState::Draining);
        lifecycle.advance(ConsumerState::Completed);
        assert_eq!(lifecycle.state(), ConsumerState::Completed);
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(ConsumerState::Running);
        lifecycle.advance(ConsumerState::Faulted);
        lifecycle.advance(ConsumerState::Running);
        assert_eq!(lifecycle.state(), ConsumerState::Faulted);
    }

    #[tokio::test]
    async fn watchers_observe_transitions() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.watch();
        assert_eq!(*rx.borrow_and_update(), ConsumerState::Stopped);

        lifecycle.advance(ConsumerState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConsumerState::Running);
    }
}
