use super::state::Key;

/// Receives the paired change notifications of an operation's flags.
///
/// For every mutation of a flag, registered observers see
/// [`will_change`](Observer::will_change) before the new value is stored
/// and [`did_change`](Observer::did_change) right after, in that order.
///
/// Notifications are delivered while the operation's state lock is held,
/// so no reader on another thread can observe the flag between the two
/// calls. For the same reason an observer must not call back into the
/// operation that notified it (`is_executing`, `start`, ...) from inside a
/// notification: the new value is passed to `did_change` instead. Hand
/// anything heavier off to another thread, the way the operation queue
/// posts a message to its dispatcher.
pub trait Observer: Send + Sync {
    /// Called before `key` is mutated.
    fn will_change(&self, _key: Key) {}

    /// Called after `key` has been set to `value`.
    fn did_change(&self, key: Key, value: bool);
}
