use super::command::Command;
use super::injector::InjectorHandle;

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;

use tracing::{debug_span, error, trace};

/// A pool thread starting ready operations.
///
/// Starting an operation only dispatches its work, so a worker is busy
/// for the duration of `start`, not for the lifetime of the operation.
pub(crate) struct Worker {
    /// Index of the worker in the pool.
    id: usize,

    injector: InjectorHandle,

    /// Reports operations abandoned by a panic to the dispatcher.
    dispatcher: Sender<Command>,
}

impl Worker {
    pub(crate) fn new(id: usize, injector: InjectorHandle, dispatcher: Sender<Command>) -> Self {
        Self {
            id,
            injector,
            dispatcher,
        }
    }

    /// Runs the worker loop until the injector shuts down.
    ///
    /// A panic escaping `start` is logged and the operation is reported as
    /// abandoned, so the dispatcher releases its slot and its dependents.
    /// The operation itself is left in whatever phase it reached.
    pub(crate) fn run(&self) {
        trace!(worker = self.id, "worker started");

        loop {
            if self.injector.is_shutdown() {
                break;
            }

            if let Some(job) = self.injector.pop() {
                let span = debug_span!(
                    "start",
                    worker = self.id,
                    id = %job.id,
                    operation = job.operation.name().unwrap_or("<unnamed>"),
                );
                let _enter = span.enter();

                if panic::catch_unwind(AssertUnwindSafe(|| job.operation.start())).is_err() {
                    error!("operation panicked while starting");
                    let _ = self.dispatcher.send(Command::Abandoned(job.id));
                }
                continue;
            }

            self.injector.park();
        }

        trace!(worker = self.id, "worker stopped");
    }
}
