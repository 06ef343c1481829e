use super::command::Command;
use super::core::OperationId;
use super::injector::{InjectorHandle, Job};
use crate::operation::{Key, Observer, Operation};

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

/// Count of operations added to a queue and not yet finished.
pub(crate) struct Outstanding {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Outstanding {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn increment(&self) {
        *self.lock() += 1;
    }

    pub(crate) fn decrement(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);

        if *count == 0 {
            self.condvar.notify_all();
        }
    }

    pub(crate) fn get(&self) -> usize {
        *self.lock()
    }

    /// Blocks until the count drops to zero.
    pub(crate) fn wait_for_zero(&self) {
        let count = self.lock();
        let _count = self
            .condvar
            .wait_while(count, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Observer forwarding an operation's finish to the dispatcher.
///
/// It only posts a message, so it never takes a lock of the queue while
/// the operation's state lock is held.
struct FinishSignal {
    id: OperationId,
    sender: Sender<Command>,
}

impl Observer for FinishSignal {
    fn did_change(&self, key: Key, value: bool) {
        if key == Key::IsFinished && value {
            let _ = self.sender.send(Command::Finished(self.id));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Some dependencies have not finished.
    Waiting,

    /// Dependencies finished; waiting for a concurrency slot.
    Ready,

    /// Handed to the workers and holding a slot.
    Running,
}

/// An operation that has not finished. Removed from the graph once it has.
struct Entry {
    operation: Arc<dyn Operation>,

    status: Status,

    /// Number of dependencies not finished yet.
    remaining: usize,

    /// Operations waiting on this one.
    dependents: Vec<OperationId>,
}

/// Owner of a queue's dependency graph.
///
/// The dispatcher runs on its own thread and processes [`Command`]s one at
/// a time, so the graph needs no lock. After every command it hands as
/// many ready operations to the workers as the concurrency limit allows.
pub(crate) struct Dispatcher {
    receiver: Receiver<Command>,

    /// Cloned into every [`FinishSignal`].
    sender: Sender<Command>,

    injector: InjectorHandle,
    outstanding: Arc<Outstanding>,

    /// `None` means unbounded.
    limit: Option<usize>,

    entries: HashMap<OperationId, Entry>,

    /// Operations in the order they became ready.
    ready: VecDeque<OperationId>,

    /// Operations currently holding a slot.
    running: usize,
}

impl Dispatcher {
    pub(crate) fn new(
        receiver: Receiver<Command>,
        sender: Sender<Command>,
        injector: InjectorHandle,
        outstanding: Arc<Outstanding>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            receiver,
            sender,
            injector,
            outstanding,
            limit,
            entries: HashMap::new(),
            ready: VecDeque::new(),
            running: 0,
        }
    }

    /// Processes commands until [`Command::Shutdown`] is received.
    pub(crate) fn run(mut self) {
        while let Ok(command) = self.receiver.recv() {
            match command {
                Command::Submit {
                    id,
                    operation,
                    dependencies,
                } => self.submit(id, operation, &dependencies),
                Command::Finished(id) => self.finish(id),
                Command::Abandoned(id) => {
                    warn!(%id, "operation panicked while starting; releasing its slot");
                    self.finish(id);
                }
                Command::CancelAll => self.cancel_all(),
                Command::Shutdown => break,
            }

            self.dispatch();
        }

        debug!(unfinished = self.entries.len(), "dispatcher stopped");
    }

    fn submit(&mut self, id: OperationId, operation: Arc<dyn Operation>, dependencies: &[OperationId]) {
        let mut remaining = 0;

        // Dependencies missing from the graph have already finished.
        for dependency in dependencies {
            if let Some(entry) = self.entries.get_mut(dependency) {
                entry.dependents.push(id);
                remaining += 1;
            }
        }

        operation.add_observer(Arc::new(FinishSignal {
            id,
            sender: self.sender.clone(),
        }));

        let already_finished = operation.is_finished();

        let status = if remaining == 0 {
            self.ready.push_back(id);
            Status::Ready
        } else {
            Status::Waiting
        };

        trace!(%id, remaining, ?status, "operation submitted");

        self.entries.insert(
            id,
            Entry {
                operation,
                status,
                remaining,
                dependents: Vec::new(),
            },
        );

        if already_finished {
            self.finish(id);
        }
    }

    fn finish(&mut self, id: OperationId) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };

        if entry.status == Status::Running {
            self.running -= 1;
        }

        let dependents = entry.dependents;

        trace!(%id, dependents = dependents.len(), "operation finished");

        for dependent in dependents {
            let Some(entry) = self.entries.get_mut(&dependent) else {
                continue;
            };

            entry.remaining = entry.remaining.saturating_sub(1);

            if entry.remaining == 0 && entry.status == Status::Waiting {
                entry.status = Status::Ready;
                self.ready.push_back(dependent);
            }
        }

        self.outstanding.decrement();
    }

    fn cancel_all(&mut self) {
        let mut cancelled = 0;

        for entry in self.entries.values() {
            entry.operation.cancel();
            cancelled += 1;
        }

        debug!(cancelled, "cancelled all unfinished operations");
    }

    /// Moves ready operations to the workers while slots are free.
    fn dispatch(&mut self) {
        while self.limit.is_none_or(|limit| self.running < limit) {
            let Some(id) = self.ready.pop_front() else {
                break;
            };

            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };

            if entry.status != Status::Ready {
                continue;
            }

            let operation = entry.operation.clone();
            entry.status = Status::Running;
            self.running += 1;

            trace!(%id, running = self.running, "operation dispatched");
            self.injector.push(Job { id, operation });
        }
    }
}
