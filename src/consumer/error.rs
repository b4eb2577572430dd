//! Consumer error types.

use std::sync::Arc;

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Consumer error taxonomy.
///
/// Configuration errors are raised at construction and are not recoverable.
/// Transient broker errors are absorbed by the underlying client's retries
/// and only surface once its budget is exhausted. A handler error is fatal to
/// the consumer instance and is surfaced through `await_completion`.
#[derive(Debug, Clone, Error)]
pub enum ConsumerError {
    /// Errors surfaced by the underlying Kafka client.
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Invalid configuration, raised at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure to build or connect a client.
    #[error("connection error: {0}")]
    Connection(String),

    /// The batch handler returned an error; fatal to the consumer instance.
    #[error("batch handler failed: {0}")]
    Handler(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// Shutdown did not complete cleanly.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl ConsumerError {
    /// Wrap a handler failure, preserving its identity for callers that
    /// want to downcast it.
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConsumerError::Handler(Arc::new(error))
    }

    /// The original handler error, when this is a handler failure.
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ConsumerError::Handler(source) => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Whether retrying the failed operation can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsumerError::Kafka(error) => {
                !matches!(error, KafkaError::MessageConsumption(_))
            }
            ConsumerError::Connection(_) => true,
            ConsumerError::Config(_) => false,
            ConsumerError::Handler(_) => false,
            ConsumerError::Shutdown(_) => false,
        }
    }

    /// Error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ConsumerError::Config(_) | ConsumerError::Handler(_) => ErrorSeverity::Fatal,
            ConsumerError::Kafka(_) | ConsumerError::Connection(_) => ErrorSeverity::Error,
            ConsumerError::Shutdown(_) => ErrorSeverity::Warning,
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Logged, processing continues.
    Warning,
    /// May be retried.
    Error,
    /// Stops the consumer.
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn handler_identity_is_preserved() {
        let error = ConsumerError::handler(Boom);
        let source = error.handler_source().expect("handler source");
        assert!(source.downcast_ref::<Boom>().is_some());
        assert_eq!(error.to_string(), "batch handler failed: boom");
    }

    #[test]
    fn config_errors_are_fatal_and_not_retryable() {
        let error = ConsumerError::Config("empty topics".to_string());
        assert!(!error.is_retryable());
        assert_eq!(error.severity(), ErrorSeverity::Fatal);
    }

    #[test]
    fn connection_errors_are_retryable() {
        let error = ConsumerError::Connection("broker down".to_string());
        assert!(error.is_retryable());
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }
}
