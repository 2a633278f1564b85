//! Core library for Talk
//!
//! ## Conversations
//! - `Conversation` - Ordered, sender-grouped message timeline
//! - `Message` / `MessageGroup` - Timeline records
//!
//! ## Execution
//! - `Controller` - Routes user input to programs, agents, or the timeline
//! - `ProgramRegistry` / `Program` / `Command` - Interactive command handlers
//! - `AgentRuntime` / `Agent` - Named long-lived state machines
//!
//! ## Collaborators
//! - `HttpClient` - JSON over HTTP
//! - `SocketConnector` - Realtime connection lifecycle

pub mod agent;
pub mod agents;
pub mod args;
pub mod colors;
pub mod config;
pub mod constants;
pub mod controller;
pub mod conversation;
pub mod emitter;
pub mod error;
pub mod http;
pub mod paths;
pub mod program;
pub mod programs;
pub mod socket;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentNotice, AgentRuntime, AgentState, AgentStep};
pub use config::TalkConfig;
pub use controller::{Controller, ControllerEvent, Session};
pub use conversation::{Conversation, ConversationKind, Message, MessageGroup};
pub use emitter::{Emitter, HandlerId};
pub use error::TalkError;
pub use http::{HttpClient, HttpError, ReqwestHttpClient};
pub use program::{EntryOptions, ProgramOutput, ProgramRegistry, ProgramStep};
pub use socket::{SocketConnector, TungsteniteConnector};
pub use users::User;
