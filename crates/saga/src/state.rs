//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of one checkout saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Idle ──► Reserving ──┬──► AllReserved ──┬──► Persisted
///                      │                  │
///                      └──────────────────┴──► Aborting ──► Compensated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Nothing has been reserved yet.
    #[default]
    Idle,

    /// Cart lines are being reserved one by one.
    Reserving,

    /// Every line is reserved; the order is being persisted.
    AllReserved,

    /// A step failed and reservations are being released.
    Aborting,

    /// The order was durably written (terminal state).
    Persisted,

    /// No order exists and reservations were released (terminal state).
    Compensated,
}

impl SagaState {
    /// Returns true if another line may be reserved.
    pub fn can_reserve(&self) -> bool {
        matches!(self, SagaState::Idle | SagaState::Reserving)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_abort(&self) -> bool {
        matches!(self, SagaState::Reserving | SagaState::AllReserved)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (Idle, Reserving)
                | (Reserving, AllReserved)
                | (Reserving, Aborting)
                | (AllReserved, Persisted)
                | (AllReserved, Aborting)
                | (Aborting, Compensated)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Persisted | SagaState::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Idle => "Idle",
            SagaState::Reserving => "Reserving",
            SagaState::AllReserved => "AllReserved",
            SagaState::Aborting => "Aborting",
            SagaState::Persisted => "Persisted",
            SagaState::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SagaState; 6] = [
        SagaState::Idle,
        SagaState::Reserving,
        SagaState::AllReserved,
        SagaState::Aborting,
        SagaState::Persisted,
        SagaState::Compensated,
    ];

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SagaState::default(), SagaState::Idle);
    }

    #[test]
    fn test_can_reserve() {
        assert!(SagaState::Idle.can_reserve());
        assert!(SagaState::Reserving.can_reserve());
        assert!(!SagaState::AllReserved.can_reserve());
        assert!(!SagaState::Aborting.can_reserve());
        assert!(!SagaState::Persisted.can_reserve());
        assert!(!SagaState::Compensated.can_reserve());
    }

    #[test]
    fn test_can_abort() {
        assert!(!SagaState::Idle.can_abort());
        assert!(SagaState::Reserving.can_abort());
        assert!(SagaState::AllReserved.can_abort());
        assert!(!SagaState::Aborting.can_abort());
        assert!(!SagaState::Persisted.can_abort());
        assert!(!SagaState::Compensated.can_abort());
    }

    #[test]
    fn test_happy_and_abort_paths() {
        assert!(SagaState::Idle.can_transition_to(SagaState::Reserving));
        assert!(SagaState::Reserving.can_transition_to(SagaState::AllReserved));
        assert!(SagaState::AllReserved.can_transition_to(SagaState::Persisted));
        assert!(SagaState::Reserving.can_transition_to(SagaState::Aborting));
        assert!(SagaState::AllReserved.can_transition_to(SagaState::Aborting));
        assert!(SagaState::Aborting.can_transition_to(SagaState::Compensated));

        assert!(!SagaState::Idle.can_transition_to(SagaState::Persisted));
        assert!(!SagaState::Reserving.can_transition_to(SagaState::Persisted));
        assert!(!SagaState::Aborting.can_transition_to(SagaState::Persisted));
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        for state in ALL.iter().filter(|s| s.is_terminal()) {
            for next in ALL {
                assert!(!state.can_transition_to(next), "{state} -> {next}");
            }
        }
        assert!(SagaState::Persisted.is_terminal());
        assert!(SagaState::Compensated.is_terminal());
        assert!(!SagaState::Aborting.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaState::Idle.to_string(), "Idle");
        assert_eq!(SagaState::AllReserved.to_string(), "AllReserved");
        assert_eq!(SagaState::Compensated.to_string(), "Compensated");
    }

    #[test]
    fn test_serialization() {
        let state = SagaState::Aborting;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
