//! The user-facing batch handler seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::consumer::batch::MessageBatch;
use crate::consumer::dispatcher::ConsumerHandle;

/// Processes one partition batch at a time.
///
/// For a given partition the dispatcher never overlaps two invocations;
/// across partitions invocations run concurrently up to the worker pool
/// size. The consumer handle is passed per invocation so a handler can call
/// `stop()` from inside a batch.
///
/// Returning `Err` is fatal to the consumer instance: no further batches are
/// dispatched and the error is surfaced through `await_completion`.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// Failure type surfaced through `await_completion`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle one batch.
    async fn handle(
        &self,
        consumer: &ConsumerHandle,
        batch: MessageBatch,
    ) -> Result<(), Self::Error>;
}

#[async_trait]
impl<T: BatchHandler> BatchHandler for Arc<T> {
    type Error = T::Error;

    async fn handle(
        &self,
        consumer: &ConsumerHandle,
        batch: MessageBatch,
    ) -> Result<(), Self::Error> {
        T::handle(self, consumer, batch).await
    }
}
