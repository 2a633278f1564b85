//! Runs of consecutive messages from one sender

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::message::Message;
#[cfg(test)]
use crate::error::TalkError;

/// Messages from a single sender, sorted ascending by timestamp (stable on ties)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageGroup {
    pub id: Uuid,
    pub sender_id: String,
    messages: Vec<Message>,
}

impl MessageGroup {
    /// Build a group from messages that must all share `sender_id`
    #[cfg(test)]
    pub(crate) fn new(
        sender_id: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<Self, TalkError> {
        let sender_id = sender_id.into();
        if let Some(stranger) = messages.iter().find(|m| m.sender_id != sender_id) {
            return Err(TalkError::Validation(format!(
                "Message from '{}' cannot join a group owned by '{}'",
                stranger.sender_id, sender_id
            )));
        }

        let mut group = Self {
            id: Uuid::new_v4(),
            sender_id,
            messages: Vec::with_capacity(messages.len()),
        };
        for message in messages {
            group.insert(message);
        }
        Ok(group)
    }

    pub fn singleton(message: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: message.sender_id.clone(),
            messages: vec![message],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.messages.first().map(|m| m.timestamp)
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Insert before the first message with a strictly later timestamp, else append.
    /// Caller guarantees the sender matches.
    pub(crate) fn insert(&mut self, message: Message) {
        let index = self.insertion_index(message.timestamp);
        self.messages.insert(index, message);
    }

    pub(crate) fn insertion_index(&self, timestamp: DateTime<Utc>) -> usize {
        self.messages
            .iter()
            .position(|m| m.timestamp > timestamp)
            .unwrap_or(self.messages.len())
    }

    /// Split at `index`, keeping `[..index]` and returning a new group with the rest
    pub(crate) fn split_off(&mut self, index: usize) -> MessageGroup {
        MessageGroup {
            id: Uuid::new_v4(),
            sender_id: self.sender_id.clone(),
            messages: self.messages.split_off(index),
        }
    }
}
