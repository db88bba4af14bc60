//! Error types shared across the broker, the workers and the transport.

use crate::broker::registry::SubscriberId;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(thiserror::Error, Debug)]
pub enum BrokerError {
    /// The broker stopped accepting subscriptions; the worker was never started.
    #[error("broker is shutting down")]
    ShuttingDown,
    #[error("failed to start execution pool: {0}")]
    PoolStartup(#[source] std::io::Error),
    /// The worker's task ended without reporting completion (panic or pool teardown).
    #[error("subscriber worker {0} exited without reporting completion")]
    WorkerLost(SubscriberId),
}

impl BrokerError {
    /// Whether a caller may reasonably retry the same request later.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, BrokerError::ShuttingDown)
    }
}

/// A write to a subscriber's outbound stream failed. The client is considered gone.
#[derive(thiserror::Error, Debug)]
#[error("stream write failed: {reason}")]
pub struct WriteError {
    pub reason: String,
}

impl WriteError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
