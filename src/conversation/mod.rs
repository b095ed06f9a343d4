//! Conversation state: messages, the append-only log, and context windowing.

pub mod log;
pub mod message;
pub mod window;

pub use log::ConversationLog;
pub use message::{MAX_SUGGESTIONS, Message, MessageId, Role};
pub use window::{DEFAULT_CONTEXT_LIMIT, window};
