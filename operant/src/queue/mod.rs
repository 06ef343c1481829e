//! Dependency-aware operation queue.
//!
//! This module hosts operations the way a scheduler is expected to drive
//! them:
//! - operations start only once their dependencies are finished,
//! - at most `max_concurrent_operations` of them execute at a time,
//! - a slot is released when an operation publishes `isFinished`.
//!
//! It is composed of:
//! - `builder`: configuration of a new queue,
//! - `core`: the public [`OperationQueue`] handle,
//! - `dispatcher`: the thread owning the dependency graph,
//! - `injector` and `worker`: the pool of threads calling `start`.

mod command;
mod dispatcher;
mod injector;
mod worker;

pub(crate) mod builder;
pub(crate) mod core;

pub use self::builder::QueueBuilder;
pub use self::core::{OperationId, OperationQueue};
