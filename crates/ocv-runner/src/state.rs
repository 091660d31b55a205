//! Run lifecycle state machine
//!
//! A run only moves forward:
//!
//! ```text
//! Pending → Running → Completed
//! ```
//!
//! Completed is terminal: the results collected there are a final snapshot,
//! and a runner that reached it refuses to be dispatched again.

use thiserror::Error;

/// Error when an invalid run state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid run state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
    pub reason: &'static str,
}

/// Lifecycle of one validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Built, nothing dispatched yet.
    Pending,
    /// Suites executing.
    Running,
    /// All suites finished, or the run stopped early. Terminal.
    Completed,
}

impl RunState {
    /// Attempt a transition, returning the new state if it is allowed.
    pub fn try_transition(self, to: RunState) -> Result<RunState, InvalidTransition> {
        use RunState::*;

        let valid = matches!((self, to), (Pending, Running) | (Running, Completed));
        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    /// Check whether a transition is valid without performing it.
    pub fn can_transition_to(self, to: RunState) -> bool {
        self.try_transition(to).is_ok()
    }

    fn transition_error_reason(from: RunState, to: RunState) -> &'static str {
        use RunState::*;

        match (from, to) {
            (Completed, _) => "a completed run is terminal",
            (Pending, Completed) => "a run completes only after it was dispatched",
            (Running, _) => "a dispatched run can only complete",
            _ => "a run only moves forward",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RunState::*;

    #[test]
    fn test_forward_path() {
        let state = Pending;
        let state = state.try_transition(Running).unwrap();
        let state = state.try_transition(Completed).unwrap();
        assert_eq!(state, Completed);
    }

    #[test]
    fn test_cannot_skip_running() {
        let err = Pending.try_transition(Completed).unwrap_err();
        assert_eq!(err.from, Pending);
        assert_eq!(err.to, Completed);
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_no_going_back() {
        assert!(!Running.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_error_display() {
        let err = Completed.try_transition(Running).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Completed"));
        assert!(msg.contains("terminal"));
    }
}
