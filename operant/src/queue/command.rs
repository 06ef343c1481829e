use super::core::OperationId;
use crate::operation::Operation;

use std::sync::Arc;

/// Messages processed by the dispatcher thread.
pub(crate) enum Command {
    /// A new operation and the operations it depends on.
    Submit {
        id: OperationId,
        operation: Arc<dyn Operation>,
        dependencies: Vec<OperationId>,
    },

    /// An operation published `isFinished = true`.
    Finished(OperationId),

    /// Starting an operation panicked; its slot must be released.
    Abandoned(OperationId),

    /// Cancel every operation that has not finished.
    CancelAll,

    Shutdown,
}
