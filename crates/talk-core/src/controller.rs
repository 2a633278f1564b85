//! Top-level coordinator
//!
//! `Controller` routes each line of user input to one of three places: the
//! running program, an agent (through `agent-ctl`), or the current
//! conversation. `Session` is the state programs see while they run.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{AgentContext, AgentNotice, AgentRuntime, AgentState};
use crate::agents::{DisplayState, RemoteServerState, UsersState};
use crate::args::{parse_arguments, split_command};
use crate::config::TalkConfig;
use crate::constants::{users::SYSTEM_USER_ID, AGENT_CTL};
use crate::conversation::{Conversation, ConversationKind, Message};
use crate::emitter::{Emitter, HandlerId};
use crate::error::TalkError;
use crate::http::HttpClient;
use crate::program::{EntryOptions, Launch, ProgramEngine, ProgramRegistry};
use crate::socket::SocketConnector;
use crate::users::{intro_text, User};

/// Events published to controller observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    CommandEntryChanged(EntryOptions),
    ConversationSwitched(Uuid),
    ConversationAdded(Uuid),
}

impl ControllerEvent {
    pub const COMMAND_ENTRY_CHANGED: &'static str = "command-entry-changed";
    pub const CONVERSATION_SWITCHED: &'static str = "conversation-switched";
    pub const CONVERSATION_ADDED: &'static str = "conversation-added";

    pub fn key(&self) -> &'static str {
        match self {
            ControllerEvent::CommandEntryChanged(_) => Self::COMMAND_ENTRY_CHANGED,
            ControllerEvent::ConversationSwitched(_) => Self::CONVERSATION_SWITCHED,
            ControllerEvent::ConversationAdded(_) => Self::CONVERSATION_ADDED,
        }
    }
}

/// Conversations, agents, and collaborators shared with running programs
pub struct Session {
    config: TalkConfig,
    conversations: Vec<Conversation>,
    current: usize,
    agents: AgentRuntime,
    programs: ProgramRegistry,
    http: Arc<dyn HttpClient>,
    events: Emitter<ControllerEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conversations", &self.conversations.len())
            .field("current", &self.current_conversation_id())
            .field("agents", &self.agents)
            .field("programs", &self.programs)
            .finish()
    }
}

impl Session {
    pub fn new(
        config: TalkConfig,
        http: Arc<dyn HttpClient>,
        agents: AgentRuntime,
        programs: ProgramRegistry,
    ) -> Self {
        let mut root = Conversation::new(
            ConversationKind::Command,
            vec![SYSTEM_USER_ID.to_string()],
        );
        if config.show_intro {
            root.insert(Message::new(
                SYSTEM_USER_ID,
                intro_text(&config.command_prefix),
            ));
        }

        Self {
            config,
            conversations: vec![root],
            current: 0,
            agents,
            programs,
            http,
            events: Emitter::new(),
        }
    }

    pub fn config(&self) -> &TalkConfig {
        &self.config
    }

    pub fn http(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http)
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    pub fn agents(&self) -> &AgentRuntime {
        &self.agents
    }

    pub fn display(&self) -> Option<&DisplayState> {
        self.agents.display()
    }

    pub fn users(&self) -> Option<&UsersState> {
        self.agents.users()
    }

    pub fn remote_server(&self) -> Option<&RemoteServerState> {
        self.agents.remote_server()
    }

    /// Post a system message to the current conversation
    pub fn post_system(&mut self, text: impl Into<String>) {
        self.current_conversation_mut()
            .insert(Message::new(SYSTEM_USER_ID, text));
    }

    /// Route an `agent-ctl` line; outcomes land in the current conversation
    pub async fn send_agent_command(&mut self, line: &str) {
        let conversation = &mut self.conversations[self.current];
        self.agents.send(line, conversation).await;
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn current_conversation(&self) -> &Conversation {
        &self.conversations[self.current]
    }

    pub fn current_conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversations[self.current]
    }

    pub fn current_conversation_id(&self) -> Uuid {
        self.current_conversation().id
    }

    pub fn add_conversation(&mut self, conversation: Conversation) -> Uuid {
        let id = conversation.id;
        debug!(conversation = %id, "Conversation added");
        self.conversations.push(conversation);
        self.emit(&ControllerEvent::ConversationAdded(id));
        id
    }

    pub fn switch_conversation(&mut self, id: Uuid) -> Result<(), TalkError> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| TalkError::NotFound(format!("Conversation [{id}] does not exist")))?;

        self.current = index;
        info!(conversation = %id, "Switched conversation");
        self.emit(&ControllerEvent::ConversationSwitched(id));
        Ok(())
    }

    /// The signed-in user when the users agent knows them, else the local user
    pub fn current_user(&self) -> User {
        let Some(auth) = self
            .remote_server()
            .and_then(|server| server.authentication.as_ref())
        else {
            return User::local();
        };

        match self.users().and_then(|users| users.get(&auth.user_id)) {
            Some(user) => user.clone(),
            None => {
                warn!(user_id = %auth.user_id, "Authenticated user has no users entry");
                User::local()
            }
        }
    }

    pub fn watch<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&ControllerEvent) + Send + Sync + 'static,
    {
        self.events.add_handler(event, handler)
    }

    pub fn unwatch(&self, event: &str, id: HandlerId) -> bool {
        self.events.remove_handler(event, id)
    }

    fn emit(&self, event: &ControllerEvent) {
        self.events.emit(event.key(), event);
    }
}

/// Routes input to programs, agents, and conversations
#[derive(Debug)]
pub struct Controller {
    session: Session,
    engine: ProgramEngine,
    history: Vec<String>,
}

impl Controller {
    /// Build the controller and start the configured agents. The receiver
    /// yields notices from background agent work; feed them back through
    /// [`Controller::receive_agent_notice`].
    pub async fn new(
        config: TalkConfig,
        http: Arc<dyn HttpClient>,
        sockets: Arc<dyn SocketConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<AgentNotice>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let step_timeout = config.step_timeout();
        let autostart = config.autostart_agents.clone();

        let mut agents = AgentRuntime::new(AgentContext::new(events_tx, sockets), step_timeout);
        for agent in crate::agents::builtin() {
            agents.register(agent);
        }

        let session = Session::new(config, http, agents, crate::programs::builtin());
        let mut controller = Self {
            session,
            engine: ProgramEngine::new(step_timeout),
            history: Vec::new(),
        };

        for name in autostart {
            controller.start_agent(&name).await;
        }

        info!(
            programs = controller.session.programs().names().len(),
            "Controller ready"
        );
        (controller, events_rx)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn is_executing(&self) -> bool {
        self.engine.is_executing()
    }

    pub fn entry_options(&self) -> &EntryOptions {
        self.engine.entry_options()
    }

    /// Unmasked lines entered so far, oldest first
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Handle one line typed by the user
    pub async fn send_message(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let executing = self.engine.is_executing();
        let command_mode =
            executing || self.session.current_conversation().kind() == ConversationKind::Command;

        let prefix = self.session.config().command_prefix.clone();
        let command = match line.strip_prefix(prefix.as_str()) {
            Some(stripped) if !executing && !prefix.is_empty() => Some(stripped),
            _ => None,
        };

        let masked = self.engine.entry_options().masked;
        if !masked {
            self.history.push(line.to_string());
        }

        if !command_mode && command.is_none() {
            let author = self.session.current_user();
            self.session
                .current_conversation_mut()
                .insert(Message::new(author.user_id, line));
            return;
        }

        let command = command.unwrap_or(line);
        let echo = if masked {
            "*".repeat(command.chars().count())
        } else {
            command.to_string()
        };
        self.session
            .current_conversation_mut()
            .insert(Message::new(SYSTEM_USER_ID, echo).command());

        self.send_command(command).await;
    }

    /// Command engine entry point
    pub async fn send_command(&mut self, line: &str) {
        if self.engine.is_executing() {
            self.engine.resume(line.to_string(), &mut self.session).await;
            self.publish_entry_options();
            return;
        }

        let (name, rest) = split_command(line);
        if name == AGENT_CTL {
            self.session.send_agent_command(rest).await;
            return;
        }

        let args = parse_arguments(rest);
        if self.engine.launch(name, args, &mut self.session).await == Launch::Program {
            self.publish_entry_options();
        }
    }

    /// Drop the running program and restore default entry
    pub fn cancel_execution(&mut self) {
        if self.engine.is_executing() {
            self.engine.cancel();
            self.session.post_system("Command cancelled");
            self.publish_entry_options();
        }
    }

    /// Show a notice produced by background agent work
    pub fn receive_agent_notice(&mut self, notice: AgentNotice) {
        debug!(agent = %notice.agent, text = %notice.text, "Agent notice");
        self.session
            .post_system(format!("[{}] - {}", notice.agent, notice.text));
    }

    pub async fn start_agent(&mut self, name: &str) {
        self.session.send_agent_command(&format!("{name} start")).await;
    }

    pub async fn stop_agent(&mut self, name: &str) {
        self.session.send_agent_command(&format!("{name} stop")).await;
    }

    pub fn agent_state(&self, name: &str) -> Option<&AgentState> {
        self.session.agents().state(name)
    }

    pub fn watch<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&ControllerEvent) + Send + Sync + 'static,
    {
        self.session.watch(event, handler)
    }

    pub fn unwatch(&self, event: &str, id: HandlerId) -> bool {
        self.session.unwatch(event, id)
    }

    /// Observe one agent's state; `None` means it stopped
    pub fn watch_agent<F>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(&Option<AgentState>) + Send + Sync + 'static,
    {
        self.session.agents().watch(name, handler)
    }

    pub fn unwatch_agent(&self, name: &str, id: HandlerId) -> bool {
        self.session.agents().unwatch(name, id)
    }

    pub fn add_conversation(&mut self, conversation: Conversation) -> Uuid {
        self.session.add_conversation(conversation)
    }

    pub fn switch_conversation(&mut self, id: Uuid) -> Result<(), TalkError> {
        self.session.switch_conversation(id)
    }

    pub fn current_conversation(&self) -> &Conversation {
        self.session.current_conversation()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.session.conversations()
    }

    pub fn current_user(&self) -> User {
        self.session.current_user()
    }

    fn publish_entry_options(&self) {
        let event = ControllerEvent::CommandEntryChanged(self.engine.entry_options().clone());
        self.session.emit(&event);
    }
}
