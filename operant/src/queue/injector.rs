use super::core::OperationId;
use crate::operation::Operation;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Upper bound on how long an idle worker sleeps before re-checking.
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// Shared handle to the ready queue.
pub(crate) type InjectorHandle = Arc<Injector>;

/// An operation cleared to start.
pub(crate) struct Job {
    pub(crate) id: OperationId,
    pub(crate) operation: Arc<dyn Operation>,
}

/// Queue of operations whose dependencies are finished and which hold a
/// concurrency slot.
///
/// The dispatcher pushes jobs; worker threads pop them and call `start`.
/// Idle workers park on a condition variable until a job arrives or the
/// queue shuts down.
pub(crate) struct Injector {
    /// Jobs in the order they became ready.
    queue: Mutex<VecDeque<Job>>,

    /// Wakes parked workers.
    condvar: Condvar,

    /// Indicates whether the queue is shutting down.
    shutdown: AtomicBool,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals shutdown and wakes all parked workers.
    ///
    /// Jobs still queued are dropped without being started.
    pub(crate) fn shutdown(&self) {
        let mut queue = self.lock();
        self.shutdown.store(true, Ordering::Release);
        queue.clear();
        self.condvar.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a job and wakes one parked worker.
    pub(crate) fn push(&self, job: Job) {
        self.lock().push_back(job);
        self.condvar.notify_one();
    }

    /// Takes the oldest job, if any.
    pub(crate) fn pop(&self) -> Option<Job> {
        self.lock().pop_front()
    }

    /// Parks the current worker until a job is pushed, shutdown is
    /// signalled, or [`PARK_TIMEOUT`] elapses.
    pub(crate) fn park(&self) {
        let queue = self.lock();

        if self.is_shutdown() || !queue.is_empty() {
            return;
        }

        let (_queue, _timeout) = self
            .condvar
            .wait_timeout(queue, PARK_TIMEOUT)
            .unwrap_or_else(PoisonError::into_inner);
    }
}
