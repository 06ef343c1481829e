//! # Operant
//!
//! **Operant** provides asynchronous operations with an observable
//! lifecycle, and a small queue that runs them with bounded concurrency and
//! dependencies between them.
//!
//! An operation's entry point does not finish it. The operation hands its
//! work a [`Completion`], and the work, once done, fires it from whatever
//! thread it ends up on. Anything hosting operations learns about progress
//! through two observable flags, `isExecuting` and `isFinished`, whose
//! every change is announced to [`Observer`]s as a will/did pair.
//!
//! The crate offers:
//!
//! - The [`Operation`] contract between an operation and its host
//! - [`AsyncOperation`], a thread-safe state machine around any [`Work`]
//! - **Cooperative cancellation**, honored when an operation starts
//! - An [`OperationQueue`] honoring dependencies and a concurrency limit
//!
//! ## Quick Start
//!
//! ```rust
//! use operant::{AsyncOperation, Completion, Operation, QueueBuilder};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let queue = QueueBuilder::new().max_concurrent_operations(5).build();
//!
//! let operation = Arc::new(AsyncOperation::new(|completion: Completion| {
//!     thread::spawn(move || {
//!         thread::sleep(Duration::from_millis(10));
//!         completion.complete();
//!     });
//! }));
//!
//! queue.add(operation.clone()).unwrap();
//! queue.wait_until_all_operations_are_finished();
//!
//! assert!(operation.is_finished());
//! ```
//!
//! ## Modules
//!
//! - [`operation`] — The operation contract and state machine
//! - [`queue`] — The dependency-aware operation queue
//! - [`error`] — Errors returned by the queue

pub mod error;
pub mod operation;
pub mod queue;

pub use error::QueueError;
pub use operation::{AsyncOperation, Completion, Key, Observer, Operation, Phase, Work};
pub use queue::{OperationId, OperationQueue, QueueBuilder};
