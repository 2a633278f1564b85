//! Conversation store
//!
//! An ordered timeline of sender groups. Messages may arrive in any order
//! (server echoes, late command responses); `insert` places each one by
//! looking only at the groups adjacent to its timestamp.

mod group;
mod message;

pub use group::MessageGroup;
pub use message::Message;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::emitter::{Emitter, HandlerId};

/// Event key fired after every mutation
pub const CHANGE_EVENT: &str = "change";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Free text; commands need the escape prefix
    #[default]
    Standard,
    /// Every line is a command
    Command,
}

/// Where a timestamp falls relative to the existing groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// At or after the newest message (ties land here)
    LaterThanAll,
    /// Before the oldest message
    EarlierThanAll,
    /// Inside the time span of the group at this index
    Within(usize),
    /// In the gap between two adjacent groups
    Between { later: usize, earlier: usize },
}

pub struct Conversation {
    pub id: Uuid,
    kind: ConversationKind,
    participants: Vec<String>,
    groups: Vec<MessageGroup>,
    emitter: Emitter<Conversation>,
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("participants", &self.participants)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Conversation {
    pub fn new(kind: ConversationKind, participants: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            participants,
            groups: Vec::new(),
            emitter: Emitter::new(),
        }
    }

    pub fn kind(&self) -> ConversationKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ConversationKind) {
        self.kind = kind;
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn groups(&self) -> &[MessageGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(MessageGroup::is_empty)
    }

    /// All messages, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.groups.iter().flat_map(|g| g.messages().iter())
    }

    pub fn message_count(&self) -> usize {
        self.groups.iter().map(MessageGroup::len).sum()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.groups.iter().rev().find_map(MessageGroup::latest)
    }

    /// Observe mutations. Handlers get a read-only view after each change.
    pub fn on_change<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Conversation) + Send + Sync + 'static,
    {
        self.emitter.add_handler(CHANGE_EVENT, handler)
    }

    pub fn remove_change_handler(&self, id: HandlerId) -> bool {
        self.emitter.remove_handler(CHANGE_EVENT, id)
    }

    /// Classify a timestamp, scanning from the newest group to the oldest
    pub fn classify(&self, timestamp: DateTime<Utc>) -> Placement {
        let Some(latest) = self.latest_timestamp() else {
            return Placement::LaterThanAll;
        };

        if timestamp >= latest {
            return Placement::LaterThanAll;
        }

        let newest = self.groups.len() - 1;
        for (index, group) in self.groups.iter().enumerate().rev() {
            let (Some(earliest), Some(latest)) = (group.earliest(), group.latest()) else {
                continue;
            };

            if timestamp > latest {
                if index == newest {
                    return Placement::LaterThanAll;
                }
                return Placement::Between {
                    later: index + 1,
                    earlier: index,
                };
            }

            if earliest > timestamp {
                continue;
            }

            return Placement::Within(index);
        }

        Placement::EarlierThanAll
    }

    /// Place a message in the timeline and notify observers
    pub fn insert(&mut self, message: Message) {
        if self.is_empty() {
            self.groups.clear();
            self.groups.push(MessageGroup::singleton(message));
            self.notify();
            return;
        }

        match self.classify(message.timestamp) {
            Placement::LaterThanAll => self.insert_latest(message),
            Placement::EarlierThanAll => self.insert_earliest(message),
            Placement::Within(index) => self.insert_within(index, message),
            Placement::Between { later, earlier } => self.insert_between(later, earlier, message),
        }

        self.notify();
    }

    /// Replace the timeline with a pre-sorted bulk load
    pub fn fill(&mut self, mut messages: Vec<Message>) {
        messages.sort_by_key(|m| m.timestamp);

        let mut groups: Vec<MessageGroup> = Vec::new();
        for message in messages {
            match groups.last_mut() {
                Some(current) if current.sender_id == message.sender_id => current.insert(message),
                _ => groups.push(MessageGroup::singleton(message)),
            }
        }

        self.groups = groups;
        self.notify();
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.notify();
    }

    fn notify(&self) {
        self.emitter.emit(CHANGE_EVENT, self);
    }

    fn sender_at(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(|g| g.sender_id.as_str())
    }

    fn insert_latest(&mut self, message: Message) {
        let last = self.groups.len() - 1;
        if self.sender_at(last) == Some(message.sender_id.as_str()) {
            self.groups[last].insert(message);
        } else {
            self.groups.push(MessageGroup::singleton(message));
        }
    }

    fn insert_earliest(&mut self, message: Message) {
        if self.sender_at(0) == Some(message.sender_id.as_str()) {
            self.groups[0].insert(message);
        } else {
            self.groups.insert(0, MessageGroup::singleton(message));
        }
    }

    fn insert_between(&mut self, later: usize, earlier: usize, message: Message) {
        let sender = Some(message.sender_id.as_str());
        if self.sender_at(later) == sender {
            self.groups[later].insert(message);
        } else if self.sender_at(earlier) == sender {
            self.groups[earlier].insert(message);
        } else {
            self.groups.insert(later, MessageGroup::singleton(message));
        }
    }

    /// A foreign sender landing inside a group splits it around the new message
    fn insert_within(&mut self, index: usize, message: Message) {
        let sender = Some(message.sender_id.as_str());
        if self.sender_at(index) == sender {
            self.groups[index].insert(message);
            return;
        }

        let at = self.groups[index].insertion_index(message.timestamp);

        if at == 0 {
            if index > 0 && self.sender_at(index - 1) == sender {
                self.groups[index - 1].insert(message);
            } else {
                self.groups.insert(index, MessageGroup::singleton(message));
            }
            return;
        }

        if at == self.groups[index].len() {
            if self.sender_at(index + 1) == sender {
                self.groups[index + 1].insert(message);
            } else {
                self.groups
                    .insert(index + 1, MessageGroup::singleton(message));
            }
            return;
        }

        let tail = self.groups[index].split_off(at);
        self.groups.insert(index + 1, MessageGroup::singleton(message));
        self.groups.insert(index + 2, tail);
    }
}
