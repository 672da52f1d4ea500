use std::fmt;

/// Control state of a [`SuspendableLoop`](crate::SuspendableLoop).
///
/// `Finished` is terminal: once entered, a loop never runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// The loop body runs repeatedly.
    Active,
    /// The loop body does not run; the loop thread stays parked.
    Suspended,
    /// The loop has terminated.
    Finished,
}

impl LoopState {
    /// Returns true for the terminal state.
    pub fn is_finished(self) -> bool {
        self == LoopState::Finished
    }

    /// Applies a state requested by the loop body to the current state.
    ///
    /// `Finished` always wins. A body returning `Active` does not undo an
    /// external suspend issued while the body was running.
    pub(crate) fn apply_request(self, requested: LoopState) -> LoopState {
        match (self, requested) {
            (LoopState::Finished, _) | (_, LoopState::Finished) => LoopState::Finished,
            (_, LoopState::Suspended) => LoopState::Suspended,
            (current, LoopState::Active) => current,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Active => "active",
            LoopState::Suspended => "suspended",
            LoopState::Finished => "finished",
        };
        f.write_str(name)
    }
}
