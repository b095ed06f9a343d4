//! Append-only conversation log.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::ConversationError;

use super::message::{Message, MessageId};

/// Ordered, append-only message history for one session.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl ConversationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from a snapshot, in the given order.
    pub fn from_messages(
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Self, ConversationError> {
        let mut log = Self::new();
        for message in messages {
            log.append(message.normalized())?;
        }
        Ok(log)
    }

    /// Append a message. Fails if a message with the same id is present.
    pub fn append(&mut self, message: Message) -> Result<(), ConversationError> {
        let id = message.id();
        if !self.ids.insert(id) {
            return Err(ConversationError::DuplicateId { id });
        }
        self.messages.push(message);
        Ok(())
    }

    /// The last `n` messages in chronological order (fewer if the log is shorter).
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Timestamp for the next entry: now, but never earlier than the last
    /// entry so log order and time order agree even if the clock steps back.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.messages.last() {
            Some(last) if last.created_at() > now => last.created_at(),
            _ => now,
        }
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
