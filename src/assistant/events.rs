//! Events broadcast to observers of a conversation.

use serde::Serialize;

use crate::conversation::Message;
use crate::error::ProviderErrorKind;

use super::state::TurnState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// A message was added to the log.
    MessageAppended { message: Message },
    /// The turn state changed.
    StateChanged { from: TurnState, to: TurnState },
    /// A provider call failed and a fallback reply was used.
    TurnFailed {
        kind: ProviderErrorKind,
        detail: String,
    },
}
