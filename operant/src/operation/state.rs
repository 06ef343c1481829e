use std::fmt;

/// Name of an observable operation flag.
///
/// Every mutation of a flag is reported to observers under its key,
/// bracketed by a `will_change` / `did_change` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// The operation's work is in flight.
    IsExecuting,

    /// The operation has reached its terminal state.
    IsFinished,
}

impl Key {
    /// Returns the property name observers know this flag by.
    pub fn as_str(self) -> &'static str {
        match self {
            Key::IsExecuting => "isExecuting",
            Key::IsFinished => "isFinished",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of an operation, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created and not yet started.
    NotStarted,

    /// Started; waiting for the work to signal completion.
    Executing,

    /// Terminal. No transition leaves this phase.
    Finished,
}

/// The two flags making up an operation's observable state.
///
/// `executing` and `finished` are never both `true`, and `finished`
/// never goes back to `false` once set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Flags {
    pub(crate) executing: bool,
    pub(crate) finished: bool,
}

impl Flags {
    pub(crate) fn get(&self, key: Key) -> bool {
        match key {
            Key::IsExecuting => self.executing,
            Key::IsFinished => self.finished,
        }
    }

    pub(crate) fn set(&mut self, key: Key, value: bool) {
        match key {
            Key::IsExecuting => self.executing = value,
            Key::IsFinished => self.finished = value,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        if self.finished {
            Phase::Finished
        } else if self.executing {
            Phase::Executing
        } else {
            Phase::NotStarted
        }
    }
}
