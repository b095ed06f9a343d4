//! Count-based context window over the conversation log.

use crate::llm::ChatMessage;

use super::log::ConversationLog;
use super::message::Message;

/// Number of prior messages sent to the backend with each turn.
pub const DEFAULT_CONTEXT_LIMIT: usize = 6;

/// The most recent `limit` messages of the log as role/content pairs.
///
/// Order is preserved and suggestion metadata is stripped. No
/// summarization or token counting happens here, so request size stays
/// constant no matter how long the conversation grows.
pub fn window(log: &ConversationLog, limit: usize) -> Vec<ChatMessage> {
    window_of(log.tail(limit))
}

fn window_of(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(ChatMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    fn alternating(n: usize) -> ConversationLog {
        let mut log = ConversationLog::new();
        for i in 0..n {
            let msg = if i % 2 == 0 {
                Message::user(format!("q{i}"))
            } else {
                Message::assistant(format!("a{i}")).with_suggestions(["more"])
            };
            log.append(msg).unwrap();
        }
        log
    }

    #[test]
    fn window_is_bounded_suffix() {
        for n in 0..15 {
            let log = alternating(n);
            let win = window(&log, DEFAULT_CONTEXT_LIMIT);
            assert!(win.len() <= DEFAULT_CONTEXT_LIMIT);
            assert_eq!(win.len(), n.min(DEFAULT_CONTEXT_LIMIT));

            let suffix = &log.messages()[n - win.len()..];
            for (entry, msg) in win.iter().zip(suffix) {
                assert_eq!(entry.role, msg.role());
                assert_eq!(entry.content, msg.content());
            }
        }
    }

    #[test]
    fn window_keeps_both_roles() {
        let log = alternating(4);
        let roles: Vec<Role> = window(&log, 6).iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn zero_limit_is_empty() {
        assert!(window(&alternating(4), 0).is_empty());
    }
}
