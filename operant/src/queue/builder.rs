use super::OperationQueue;

use std::thread;

/// Builder for configuring and creating an [`OperationQueue`].
///
/// # Examples
///
/// ```rust
/// use operant::QueueBuilder;
///
/// let queue = QueueBuilder::new()
///     .name("downloads")
///     .worker_threads(2)
///     .max_concurrent_operations(5)
///     .build();
///
/// assert_eq!(queue.max_concurrent_operations(), Some(5));
/// ```
#[derive(Debug, Clone)]
pub struct QueueBuilder {
    /// Label used in log events.
    name: Option<String>,

    /// Number of threads calling `start` on ready operations.
    worker_threads: usize,

    /// Maximum number of operations executing at once.
    max_concurrent_operations: Option<usize>,
}

impl QueueBuilder {
    /// Creates a new `QueueBuilder` with default configuration.
    ///
    /// By default the queue has one worker thread per logical CPU (falling
    /// back to `1` if unavailable) and no concurrency limit.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            name: None,
            worker_threads,
            max_concurrent_operations: None,
        }
    }

    /// Sets the queue's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of worker threads.
    ///
    /// Workers only run `start`, which hands the work off and returns, so
    /// this does not bound how many operations execute at once. Use
    /// [`max_concurrent_operations`](Self::max_concurrent_operations) for
    /// that.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the maximum number of operations executing at once.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_concurrent_operations(mut self, n: usize) -> Self {
        assert!(n > 0, "max_concurrent_operations must be > 0");

        self.max_concurrent_operations = Some(n);
        self
    }

    /// Builds the queue with the configured options.
    ///
    /// This spawns the dispatcher and worker threads.
    pub fn build(self) -> OperationQueue {
        OperationQueue::new(self.name, self.worker_threads, self.max_concurrent_operations)
    }
}

impl Default for QueueBuilder {
    /// Creates a default `QueueBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
