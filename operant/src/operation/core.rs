use super::Operation;
use super::completion::Completion;
use super::observer::Observer;
use super::state::{Flags, Key, Phase};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

/// The work performed by an [`AsyncOperation`].
///
/// `run` starts the actual asynchronous job and returns without waiting for
/// it. When the job concludes, from whatever thread it ends up on, it calls
/// [`Completion::complete`] on the handle it was given.
///
/// There is no default body: an operation without work behavior is
/// rejected at compile time.
///
/// ```compile_fail
/// use operant::Work;
///
/// struct Idle;
///
/// impl Work for Idle {}
/// ```
///
/// Any `Fn(Completion)` closure is a `Work`:
///
/// ```
/// use operant::{AsyncOperation, Completion, Operation};
/// use std::thread;
///
/// let operation = AsyncOperation::new(|completion: Completion| {
///     thread::spawn(move || completion.complete());
/// });
///
/// operation.start();
/// ```
pub trait Work: Send + Sync + 'static {
    /// Performs the work and eventually signals `completion`.
    fn run(&self, completion: Completion);
}

impl<F> Work for F
where
    F: Fn(Completion) + Send + Sync + 'static,
{
    fn run(&self, completion: Completion) {
        self(completion)
    }
}

/// Block run once the operation is finished.
type CompletionBlock = Box<dyn FnOnce() + Send + 'static>;

/// Lock-protected part of an operation.
struct State {
    flags: Flags,
    observers: Vec<Arc<dyn Observer>>,
}

impl State {
    /// Stores `value` under `key`, bracketed by the observer notifications.
    fn write(&mut self, key: Key, value: bool) {
        for observer in &self.observers {
            observer.will_change(key);
        }

        self.flags.set(key, value);
        trace!(key = key.as_str(), value, "flag changed");

        for observer in &self.observers {
            observer.did_change(key, value);
        }
    }

    fn mark_executing(&mut self) {
        self.write(Key::IsFinished, false);
        self.write(Key::IsExecuting, true);
    }

    fn mark_finished(&mut self) {
        self.write(Key::IsExecuting, false);
        self.write(Key::IsFinished, true);
    }
}

/// State shared between an operation and the completions it hands out.
pub(crate) struct Shared {
    name: Option<String>,

    /// The flags and their observers, behind the operation's only lock.
    state: Mutex<State>,

    /// Cooperative cancellation flag, consumed by `start`.
    cancelled: AtomicBool,

    completion_block: Mutex<Option<CompletionBlock>>,
}

impl Shared {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            state: Mutex::new(State {
                flags: Flags::default(),
                observers: Vec::new(),
            }),
            cancelled: AtomicBool::new(false),
            completion_block: Mutex::new(None),
        }
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Locks the state.
    ///
    /// The flags are only written inside `State::write`, which never leaves
    /// them half-updated, so a lock poisoned by a panicking observer is
    /// still safe to use.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flags(&self) -> Flags {
        self.lock().flags
    }

    /// Terminal transition signalled by a `Completion`.
    pub(crate) fn finish(&self) {
        {
            let mut state = self.lock();
            if state.flags.finished {
                return;
            }
            state.mark_finished();
        }

        debug!(operation = self.label(), "operation finished");
        self.run_completion_block();
    }

    fn run_completion_block(&self) {
        let block = self
            .completion_block
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(block) = block {
            block();
        }
    }
}

/// An asynchronous operation wrapping a [`Work`] value.
///
/// `AsyncOperation` implements the operation state machine:
///
/// ```text
/// NotStarted --(cancelled)--> Finished          work is never run
/// NotStarted ---------------> Executing
/// Executing --(complete)----> Finished
/// ```
///
/// Its flags are read and written under a single per-instance lock, and
/// every write is announced to the registered [`Observer`]s. The operation
/// is asynchronous: returning from [`start`](Operation::start) does not
/// finish it, only the [`Completion`] passed to the work does.
pub struct AsyncOperation<W: Work> {
    shared: Arc<Shared>,
    work: W,
}

impl<W: Work> AsyncOperation<W> {
    /// Creates an operation in the `NotStarted` phase.
    pub fn new(work: W) -> Self {
        Self {
            shared: Arc::new(Shared::new(None)),
            work,
        }
    }

    /// Creates a named operation. The name shows up in log events.
    pub fn named(name: impl Into<String>, work: W) -> Self {
        Self {
            shared: Arc::new(Shared::new(Some(name.into()))),
            work,
        }
    }

    /// Returns the wrapped work.
    pub fn work(&self) -> &W {
        &self.work
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.flags().phase()
    }

    /// Sets a block to run once the operation has finished.
    ///
    /// The block runs exactly once, after `isFinished` became `true`,
    /// on the thread that finished the operation and outside of the
    /// state lock. Setting a new block replaces the previous one; a block
    /// set after the operation finished is never run.
    pub fn set_completion_block<F>(&self, block: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self
            .shared
            .completion_block
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(block));
    }
}

impl<W: Work> Operation for AsyncOperation<W> {
    /// Starts the operation.
    ///
    /// A cancelled operation finishes immediately without running its work.
    /// Otherwise the operation becomes executing and the work is run on the
    /// calling thread with a fresh [`Completion`].
    ///
    /// Starting an operation that already left `NotStarted` has no effect.
    fn start(&self) {
        let cancelled = {
            let mut state = self.shared.lock();

            if state.flags.phase() != Phase::NotStarted {
                warn!(
                    operation = self.shared.label(),
                    phase = ?state.flags.phase(),
                    "start called on an operation that already started"
                );
                return;
            }

            let cancelled = self.shared.cancelled.load(Ordering::Acquire);
            if cancelled {
                state.mark_finished();
            } else {
                state.mark_executing();
            }
            cancelled
        };

        if cancelled {
            debug!(operation = self.shared.label(), "operation cancelled before start");
            self.shared.run_completion_block();
            return;
        }

        debug!(operation = self.shared.label(), "operation started");
        self.work.run(Completion::new(self.shared.clone()));
    }

    fn is_executing(&self) -> bool {
        self.shared.flags().get(Key::IsExecuting)
    }

    fn is_finished(&self) -> bool {
        self.shared.flags().get(Key::IsFinished)
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Requests cancellation.
    ///
    /// Only honored if the operation has not started yet. Work already in
    /// flight runs to its own completion.
    fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::AcqRel) {
            debug!(operation = self.shared.label(), "operation cancelled");
        }
    }

    fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.shared.lock().observers.push(observer);
    }

    fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }
}

impl<W: Work> fmt::Debug for AsyncOperation<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.shared.flags();

        f.debug_struct("AsyncOperation")
            .field("name", &self.shared.name)
            .field("executing", &flags.executing)
            .field("finished", &flags.finished)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
