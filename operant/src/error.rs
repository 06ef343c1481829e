//! Error types.

use crate::queue::OperationId;

use thiserror::Error;

/// Errors returned when adding operations to an [`OperationQueue`](crate::OperationQueue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A declared dependency was not returned by this queue.
    #[error("unknown dependency: {0}")]
    UnknownDependency(OperationId),

    /// The queue is shutting down and no longer accepts operations.
    #[error("operation queue is shut down")]
    ShutDown,
}
