//! Turn state machine.

use serde::{Deserialize, Serialize};

/// Whether a conversation is waiting on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Ready to accept a submission.
    #[default]
    Idle,
    /// A provider call is outstanding; submissions are rejected.
    AwaitingResponse,
}

impl TurnState {
    pub fn can_transition_to(&self, target: TurnState) -> bool {
        use TurnState::*;

        matches!((self, target), (Idle, AwaitingResponse) | (AwaitingResponse, Idle))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingResponse)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingResponse => "awaiting_response",
        };
        write!(f, "{s}")
    }
}
