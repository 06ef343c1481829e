//! Asynchronous operations.
//!
//! An operation is a unit of work whose completion is reported through a
//! callback rather than by returning from its entry point. This module
//! defines:
//! - the [`Operation`] contract a host scheduler drives and observes,
//! - the [`Work`] trait concrete operations supply their job through,
//! - [`AsyncOperation`], the state machine tying the two together,
//! - the flag keys and [`Observer`] notifications published on every
//!   state change.

mod completion;
mod core;
mod observer;
mod state;

pub use self::completion::Completion;
pub use self::core::{AsyncOperation, Work};
pub use self::observer::Observer;
pub use self::state::{Key, Phase};

use std::sync::Arc;

/// The contract between an operation and the scheduler hosting it.
///
/// The scheduler calls [`start`](Operation::start) once, when the
/// operation's dependencies are finished and a concurrency slot is free,
/// then watches `isExecuting` / `isFinished` to learn when the slot can be
/// released and dependents may run.
pub trait Operation: Send + Sync {
    /// Entry point, invoked once by the host.
    fn start(&self);

    /// Returns `true` while the operation's work is in flight.
    fn is_executing(&self) -> bool;

    /// Returns `true` once the operation has finished. Never reverts.
    fn is_finished(&self) -> bool;

    /// Returns `true` if cancellation was requested.
    fn is_cancelled(&self) -> bool;

    /// Requests cooperative cancellation, honored only before the
    /// operation starts.
    fn cancel(&self);

    /// Whether the operation manages its own lifecycle.
    ///
    /// An asynchronous operation is not finished when `start` returns; the
    /// host must observe `isFinished` instead.
    fn is_asynchronous(&self) -> bool {
        true
    }

    /// Registers an observer for the operation's flag changes.
    fn add_observer(&self, observer: Arc<dyn Observer>);

    /// Optional label used in diagnostics.
    fn name(&self) -> Option<&str> {
        None
    }
}
