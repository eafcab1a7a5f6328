use core::fmt;

/// Identifier of one run-to-completion unit of mutator execution.
///
/// Turns are strictly increasing for the lifetime of a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Turn(u64);

impl Turn {
    /// The turn a fresh context starts in.
    pub const FIRST: Turn = Turn(1);

    #[inline]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The turn clock. Owned by the context; there is no process-wide turn.
pub struct TurnClock {
    current: Turn,
}

impl TurnClock {
    pub fn new() -> TurnClock {
        TurnClock { current: Turn::FIRST }
    }

    #[inline]
    pub fn current(&self) -> Turn {
        self.current
    }

    /// Move to the next turn and return it.
    pub fn advance(&mut self) -> Turn {
        self.current = Turn(self.current.0 + 1);
        self.current
    }
}
