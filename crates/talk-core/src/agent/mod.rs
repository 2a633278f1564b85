//! Agent system for Talk
//!
//! ## Core Components
//! - `Agent` - Reducer over `(state, command, args) -> (message, state)`
//! - `AgentState` - Tagged union of every agent's concrete state
//! - `AgentRuntime` - Named registry that starts, stops, and dispatches
//!
//! Agents never hold a reference back to the controller. Work that outlives
//! a step (socket lifecycle) reports through `AgentContext::events`.

pub mod runtime;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::agents::{DisplayState, RemoteServerState, UsersState};
use crate::socket::SocketConnector;

pub use runtime::AgentRuntime;

/// Text an agent wants shown outside of a step (e.g. a socket closed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentNotice {
    pub agent: String,
    pub text: String,
}

impl AgentNotice {
    pub fn new(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            text: text.into(),
        }
    }
}

/// State of a running agent, one variant per agent kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "agent", rename_all = "kebab-case")]
pub enum AgentState {
    Display(DisplayState),
    RemoteServer(RemoteServerState),
    Users(UsersState),
}

impl AgentState {
    pub fn as_display(&self) -> Option<&DisplayState> {
        match self {
            AgentState::Display(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_remote_server(&self) -> Option<&RemoteServerState> {
        match self {
            AgentState::RemoteServer(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_users(&self) -> Option<&UsersState> {
        match self {
            AgentState::Users(state) => Some(state),
            _ => None,
        }
    }
}

/// Result of one agent step
#[derive(Debug, Clone)]
pub struct AgentStep {
    pub message: Option<String>,
    pub state: AgentState,
    /// The agent has finished and should be detached
    pub done: bool,
}

impl AgentStep {
    pub fn reply(message: impl Into<String>, state: AgentState) -> Self {
        Self {
            message: Some(message.into()),
            state,
            done: false,
        }
    }

    pub fn silent(state: AgentState) -> Self {
        Self {
            message: None,
            state,
            done: false,
        }
    }

    pub fn finish(mut self) -> Self {
        self.done = true;
        self
    }
}

/// Services available to agents during a step
#[derive(Clone)]
pub struct AgentContext {
    pub events: mpsc::UnboundedSender<AgentNotice>,
    pub sockets: Arc<dyn SocketConnector>,
}

impl AgentContext {
    pub fn new(
        events: mpsc::UnboundedSender<AgentNotice>,
        sockets: Arc<dyn SocketConnector>,
    ) -> Self {
        Self { events, sockets }
    }
}

/// Trait for agent implementations
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name used to address it
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// First step of a fresh process
    async fn start(&self, args: &[String], ctx: &AgentContext) -> anyhow::Result<AgentStep>;

    /// Handle one command against the current state. `stop` is delivered
    /// here as the final step before the process is discarded.
    async fn handle(
        &self,
        state: &AgentState,
        command: &str,
        args: &[String],
        ctx: &AgentContext,
    ) -> anyhow::Result<AgentStep>;
}

/// Extract the agent's own state variant or fail the step
macro_rules! expect_state {
    ($state:expr, $variant:ident) => {
        match $state {
            $crate::agent::AgentState::$variant(inner) => inner,
            other => {
                return Err(anyhow::anyhow!(
                    "Agent received foreign state: {:?}",
                    std::mem::discriminant(other)
                ))
            }
        }
    };
}

pub(crate) use expect_state;
