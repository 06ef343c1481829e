use super::command::Command;
use super::dispatcher::{Dispatcher, Outstanding};
use super::injector::{Injector, InjectorHandle};
use super::worker::Worker;
use crate::error::QueueError;
use crate::operation::Operation;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

/// Source of queue identities, so ids of one queue are rejected by another.
static NEXT_QUEUE: AtomicUsize = AtomicUsize::new(0);

/// Identifier of an operation added to an [`OperationQueue`].
///
/// Returned by [`OperationQueue::add`] and used to declare dependencies.
/// An id only exists once its operation was added, so dependencies always
/// point backwards and cannot form a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId {
    queue: usize,
    seq: u64,
}

impl OperationId {
    #[cfg(test)]
    pub(crate) fn new(queue: usize, seq: u64) -> Self {
        Self { queue, seq }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.queue, self.seq)
    }
}

/// Id allocation and the dispatcher's inbox, behind one lock so that
/// `Submit` commands reach the dispatcher in id order.
struct Submitter {
    queue: usize,
    next: u64,
    open: bool,
    sender: Sender<Command>,
}

impl Submitter {
    fn issued(&self, id: OperationId) -> bool {
        id.queue == self.queue && id.seq < self.next
    }

    fn allocate(&mut self) -> OperationId {
        let id = OperationId {
            queue: self.queue,
            seq: self.next,
        };
        self.next += 1;
        id
    }
}

/// A queue running asynchronous operations with bounded concurrency and
/// dependencies.
///
/// `OperationQueue` is responsible for:
/// - tracking the dependencies declared when operations are added,
/// - calling [`Operation::start`] once all of an operation's dependencies
///   are finished and a concurrency slot is free,
/// - observing `isFinished` to release the slot and unblock dependents.
///
/// Dropping the queue shuts it down: operations that have not started yet
/// are released without ever being started, while work already in flight
/// continues on its own.
///
/// # Examples
///
/// ```
/// use operant::{AsyncOperation, Completion, Operation, QueueBuilder};
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = QueueBuilder::new().max_concurrent_operations(2).build();
///
/// let download = Arc::new(AsyncOperation::named("download", |done: Completion| {
///     thread::spawn(move || done.complete());
/// }));
/// let unpack = Arc::new(AsyncOperation::named("unpack", |done: Completion| {
///     thread::spawn(move || done.complete());
/// }));
///
/// let first = queue.add(download.clone()).unwrap();
/// queue.add_with_dependencies(unpack.clone(), &[first]).unwrap();
///
/// queue.wait_until_all_operations_are_finished();
/// assert!(download.is_finished() && unpack.is_finished());
/// ```
pub struct OperationQueue {
    name: Option<String>,
    max_concurrent_operations: Option<usize>,

    submitter: Mutex<Submitter>,
    outstanding: Arc<Outstanding>,
    injector: InjectorHandle,

    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl OperationQueue {
    /// Creates a queue and starts its dispatcher and worker threads.
    pub(crate) fn new(
        name: Option<String>,
        worker_threads: usize,
        max_concurrent_operations: Option<usize>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let injector = Arc::new(Injector::new());
        let outstanding = Arc::new(Outstanding::new());

        let dispatcher = Dispatcher::new(
            receiver,
            sender.clone(),
            injector.clone(),
            outstanding.clone(),
            max_concurrent_operations,
        );
        let dispatcher = thread::spawn(move || dispatcher.run());

        let workers = (0..worker_threads)
            .map(|id| {
                let worker = Worker::new(id, injector.clone(), sender.clone());
                thread::spawn(move || worker.run())
            })
            .collect();

        let queue = NEXT_QUEUE.fetch_add(1, Ordering::Relaxed);

        info!(
            queue,
            name = name.as_deref().unwrap_or("<unnamed>"),
            worker_threads,
            max_concurrent_operations = ?max_concurrent_operations,
            "operation queue started"
        );

        Self {
            name,
            max_concurrent_operations,
            submitter: Mutex::new(Submitter {
                queue,
                next: 0,
                open: true,
                sender,
            }),
            outstanding,
            injector,
            dispatcher: Some(dispatcher),
            workers,
        }
    }

    fn submitter(&self) -> MutexGuard<'_, Submitter> {
        self.submitter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the queue's name, if one was configured.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the concurrency limit; `None` means unbounded.
    pub fn max_concurrent_operations(&self) -> Option<usize> {
        self.max_concurrent_operations
    }

    /// Returns the number of added operations that have not finished.
    pub fn operation_count(&self) -> usize {
        self.outstanding.get()
    }

    /// Adds an operation without dependencies.
    pub fn add(&self, operation: Arc<dyn Operation>) -> Result<OperationId, QueueError> {
        self.add_with_dependencies(operation, &[])
    }

    /// Adds an operation that may only start once every operation in
    /// `dependencies` is finished.
    ///
    /// # Errors
    ///
    /// - [`QueueError::UnknownDependency`] if a dependency was not returned
    ///   by this queue.
    /// - [`QueueError::ShutDown`] if the queue no longer accepts operations.
    pub fn add_with_dependencies(
        &self,
        operation: Arc<dyn Operation>,
        dependencies: &[OperationId],
    ) -> Result<OperationId, QueueError> {
        let mut submitter = self.submitter();

        if !submitter.open {
            return Err(QueueError::ShutDown);
        }

        if let Some(unknown) = dependencies.iter().find(|id| !submitter.issued(**id)) {
            return Err(QueueError::UnknownDependency(*unknown));
        }

        let id = submitter.allocate();
        debug!(
            %id,
            operation = operation.name().unwrap_or("<unnamed>"),
            dependencies = dependencies.len(),
            "adding operation"
        );

        self.outstanding.increment();

        let command = Command::Submit {
            id,
            operation,
            dependencies: dependencies.to_vec(),
        };

        if submitter.sender.send(command).is_err() {
            self.outstanding.decrement();
            return Err(QueueError::ShutDown);
        }

        Ok(id)
    }

    /// Adds independent operations, optionally blocking until the queue has
    /// no unfinished operations left.
    pub fn add_operations<I>(
        &self,
        operations: I,
        wait_until_finished: bool,
    ) -> Result<Vec<OperationId>, QueueError>
    where
        I: IntoIterator<Item = Arc<dyn Operation>>,
    {
        let ids = operations
            .into_iter()
            .map(|operation| self.add(operation))
            .collect::<Result<Vec<_>, _>>()?;

        if wait_until_finished {
            self.wait_until_all_operations_are_finished();
        }

        Ok(ids)
    }

    /// Cancels every operation in the queue that has not finished.
    ///
    /// Operations that have not started finish as soon as they are
    /// started, without running their work. Executing operations are not
    /// interrupted.
    pub fn cancel_all(&self) {
        let _ = self.submitter().sender.send(Command::CancelAll);
    }

    /// Blocks the current thread until every added operation has finished.
    pub fn wait_until_all_operations_are_finished(&self) {
        self.outstanding.wait_for_zero();
    }
}

impl Drop for OperationQueue {
    /// Shuts the queue down.
    ///
    /// 1. Stops accepting operations and stops the dispatcher
    /// 2. Stops the workers, dropping jobs that were not started
    /// 3. Joins all threads
    fn drop(&mut self) {
        {
            let mut submitter = self.submitter();
            submitter.open = false;
            let _ = submitter.sender.send(Command::Shutdown);
        }

        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }

        self.injector.shutdown();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        debug!(name = self.name.as_deref().unwrap_or("<unnamed>"), "operation queue stopped");
    }
}

impl fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationQueue")
            .field("name", &self.name)
            .field("max_concurrent_operations", &self.max_concurrent_operations)
            .field("operation_count", &self.operation_count())
            .finish()
    }
}
