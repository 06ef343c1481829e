use super::core::Shared;

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// The completion callback handed to [`Work::run`](crate::Work::run).
///
/// Calling [`complete`](Completion::complete) moves the operation from
/// executing to finished. It may be called from any thread, and because it
/// consumes the handle it can be called at most once.
///
/// Dropping a `Completion` without completing it leaves the operation
/// executing forever. That is a bug in the work implementation; it is
/// reported through a `warn` event but not otherwise handled.
#[must_use = "the operation stays executing until `complete` is called"]
pub struct Completion {
    /// Set until the handle is consumed by `complete`.
    shared: Option<Arc<Shared>>,
}

impl Completion {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Signals that the asynchronous work has concluded.
    ///
    /// Performs the terminal transition (`isExecuting = false`, then
    /// `isFinished = true`) and runs the operation's completion block, if
    /// one was set, on the calling thread.
    pub fn complete(mut self) {
        if let Some(shared) = self.shared.take() {
            shared.finish();
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            warn!(
                operation = shared.label(),
                "completion dropped without being signalled; operation stays executing"
            );
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("operation", &self.shared.as_ref().map(|s| s.label()))
            .finish()
    }
}
