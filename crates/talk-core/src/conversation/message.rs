//! Timeline message record

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A single chat or system line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_command: bool,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::at(sender_id, text, Utc::now())
    }

    /// Create a message with an explicit timestamp (server echoes, bulk loads)
    pub fn at(
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            text: text.into(),
            timestamp,
            is_command: false,
        }
    }

    /// Mark as an echoed command line
    pub fn command(mut self) -> Self {
        self.is_command = true;
        self
    }
}
