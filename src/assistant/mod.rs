//! Conversation orchestration: turn state, events and the controller.

mod controller;
mod events;
mod state;

pub use controller::ConversationController;
pub use events::AssistantEvent;
pub use state::TurnState;
