//! Agent runtime - starts, stops, and dispatches to named agents
//!
//! Every outcome is reported as a system message in the conversation the
//! command was issued from. State changes are published per agent name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{Agent, AgentContext, AgentState, AgentStep};
use crate::agents::{DisplayState, RemoteServerState, UsersState};
use crate::args::{parse_agent_arguments, split_command};
use crate::constants::users::SYSTEM_USER_ID;
use crate::conversation::{Conversation, Message};
use crate::emitter::{Emitter, HandlerId};

struct AgentSlot {
    agent: Arc<dyn Agent>,
    state: Option<AgentState>,
}

/// Named registry of agents and their current state
pub struct AgentRuntime {
    agents: HashMap<String, AgentSlot>,
    context: AgentContext,
    step_timeout: Duration,
    emitter: Emitter<Option<AgentState>>,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.agents.keys().collect();
        names.sort();
        f.debug_struct("AgentRuntime")
            .field("agents", &names)
            .field("step_timeout", &self.step_timeout)
            .finish()
    }
}

impl AgentRuntime {
    pub fn new(context: AgentContext, step_timeout: Duration) -> Self {
        Self {
            agents: HashMap::new(),
            context,
            step_timeout,
            emitter: Emitter::new(),
        }
    }

    /// Register an agent. It stays stopped until started.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        debug!(agent = %name, "Registered agent");
        self.agents.insert(name, AgentSlot { agent, state: None });
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state(name).is_some()
    }

    pub fn state(&self, name: &str) -> Option<&AgentState> {
        self.agents.get(name).and_then(|slot| slot.state.as_ref())
    }

    pub fn display(&self) -> Option<&DisplayState> {
        self.state(crate::constants::agents::DISPLAY)
            .and_then(AgentState::as_display)
    }

    pub fn users(&self) -> Option<&UsersState> {
        self.state(crate::constants::agents::USERS)
            .and_then(AgentState::as_users)
    }

    pub fn remote_server(&self) -> Option<&RemoteServerState> {
        self.state(crate::constants::agents::REMOTE_SERVER)
            .and_then(AgentState::as_remote_server)
    }

    /// Observe state changes of one agent. `None` means it stopped.
    pub fn watch<F>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(&Option<AgentState>) + Send + Sync + 'static,
    {
        self.emitter.add_handler(name, handler)
    }

    pub fn unwatch(&self, name: &str, id: HandlerId) -> bool {
        self.emitter.remove_handler(name, id)
    }

    /// Route an `agent-ctl` line: `<agent> <start|stop|command> [args]`
    pub async fn send(&mut self, line: &str, conversation: &mut Conversation) {
        let (name, rest) = split_command(line);

        if !self.contains(name) {
            post(
                conversation,
                format!(
                    "Unrecognized agent name [{name}]. You may need to load the agent manually"
                ),
            );
            return;
        }

        let (command, rest) = split_command(rest);
        if command.is_empty() {
            post(
                conversation,
                format!("Missing command for agent [{name}]. Use start, stop or an agent command"),
            );
            return;
        }

        let args = parse_agent_arguments(rest);
        let name = name.to_string();
        match command {
            "start" => self.start(&name, &args, conversation).await,
            "stop" => self.stop(&name, &args, conversation).await,
            _ => self.dispatch(&name, command, &args, conversation).await,
        }
    }

    pub async fn start(&mut self, name: &str, args: &[String], conversation: &mut Conversation) {
        let Some(slot) = self.agents.get(name) else {
            return;
        };
        if slot.state.is_some() {
            post(conversation, format!("Agent [{name}] is already running."));
            return;
        }

        post(conversation, format!("Starting agent [{name}]..."));
        info!(agent = name, "Starting agent");

        let agent = Arc::clone(&slot.agent);
        let step = self.guarded(name, agent.start(args, &self.context)).await;

        let next = match step {
            Some(step) => {
                surface(conversation, name, &step);
                (!step.done).then_some(step.state)
            }
            None => None,
        };

        self.replace_state(name, next);
        self.report_if_stopped(name, conversation);
    }

    pub async fn stop(&mut self, name: &str, args: &[String], conversation: &mut Conversation) {
        let Some(slot) = self.agents.get(name) else {
            return;
        };
        let Some(state) = slot.state.clone() else {
            post(conversation, format!("Agent [{name}] is already stopped."));
            return;
        };

        post(conversation, format!("Stopping agent [{name}]..."));
        info!(agent = name, "Stopping agent");

        let agent = Arc::clone(&slot.agent);
        if let Some(step) = self
            .guarded(name, agent.handle(&state, "stop", args, &self.context))
            .await
        {
            surface(conversation, name, &step);
        }

        self.replace_state(name, None);
        self.report_if_stopped(name, conversation);
    }

    pub async fn dispatch(
        &mut self,
        name: &str,
        command: &str,
        args: &[String],
        conversation: &mut Conversation,
    ) {
        let Some(slot) = self.agents.get(name) else {
            return;
        };
        let Some(state) = slot.state.clone() else {
            post(
                conversation,
                format!("Command [{command}] could not be sent. Agent [{name}] is stopped"),
            );
            return;
        };

        debug!(agent = name, command, "Dispatching agent command");
        let agent = Arc::clone(&slot.agent);
        let Some(step) = self
            .guarded(name, agent.handle(&state, command, args, &self.context))
            .await
        else {
            return;
        };

        surface(conversation, name, &step);
        let next = (!step.done).then_some(step.state);
        self.replace_state(name, next);
        self.report_if_stopped(name, conversation);
    }

    async fn guarded<F>(&self, name: &str, step: F) -> Option<AgentStep>
    where
        F: Future<Output = anyhow::Result<AgentStep>>,
    {
        match tokio::time::timeout(self.step_timeout, step).await {
            Ok(Ok(step)) => Some(step),
            Ok(Err(e)) => {
                error!(agent = name, "Agent step failed: {:#}", e);
                None
            }
            Err(_) => {
                warn!(
                    agent = name,
                    timeout_secs = self.step_timeout.as_secs(),
                    "Agent step timed out"
                );
                None
            }
        }
    }

    fn replace_state(&mut self, name: &str, state: Option<AgentState>) {
        if let Some(slot) = self.agents.get_mut(name) {
            slot.state = state;
            self.emitter.emit(name, &slot.state);
        }
    }

    fn report_if_stopped(&self, name: &str, conversation: &mut Conversation) {
        if !self.is_running(name) {
            info!(agent = name, "Agent stopped");
            post(conversation, format!("Agent [{name}] has stopped"));
        }
    }
}

fn post(conversation: &mut Conversation, text: String) {
    conversation.insert(Message::new(SYSTEM_USER_ID, text));
}

fn surface(conversation: &mut Conversation, name: &str, step: &AgentStep) {
    if let Some(message) = step.message.as_deref().filter(|m| !m.is_empty()) {
        post(conversation, format!("[{name}] - {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DisplayAgent, DisplayState};
    use crate::conversation::ConversationKind;
    use crate::testing::agent_context;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct BrokenAgent;

    #[async_trait]
    impl Agent for BrokenAgent {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Fails every step after start"
        }

        async fn start(&self, _args: &[String], _ctx: &AgentContext) -> anyhow::Result<AgentStep> {
            Ok(AgentStep::silent(AgentState::Display(DisplayState::default())))
        }

        async fn handle(
            &self,
            _state: &AgentState,
            command: &str,
            _args: &[String],
            _ctx: &AgentContext,
        ) -> anyhow::Result<AgentStep> {
            match command {
                "quit" => Ok(AgentStep::reply(
                    "bye",
                    AgentState::Display(DisplayState::default()),
                )
                .finish()),
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    anyhow::bail!("unreachable")
                }
                _ => anyhow::bail!("boom"),
            }
        }
    }

    struct FailingStart;

    #[async_trait]
    impl Agent for FailingStart {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Cannot start"
        }

        async fn start(&self, _args: &[String], _ctx: &AgentContext) -> anyhow::Result<AgentStep> {
            anyhow::bail!("no start for you")
        }

        async fn handle(
            &self,
            state: &AgentState,
            _command: &str,
            _args: &[String],
            _ctx: &AgentContext,
        ) -> anyhow::Result<AgentStep> {
            Ok(AgentStep::silent(state.clone()))
        }
    }

    fn runtime() -> AgentRuntime {
        let (ctx, _rx, _sockets) = agent_context();
        let mut runtime = AgentRuntime::new(ctx, Duration::from_millis(200));
        runtime.register(Arc::new(DisplayAgent));
        runtime.register(Arc::new(BrokenAgent));
        runtime.register(Arc::new(FailingStart));
        runtime
    }

    fn texts(conversation: &Conversation) -> Vec<String> {
        conversation.messages().map(|m| m.text.clone()).collect()
    }

    #[tokio::test]
    async fn test_start_emits_starting_and_body() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("display start", &mut conversation).await;

        let texts = texts(&conversation);
        assert_eq!(
            texts,
            vec![
                "Starting agent [display]...",
                "[display] - Display agent started successfully"
            ]
        );
        assert_eq!(
            texts.iter().filter(|t| t.starts_with("Starting")).count(),
            1
        );
        assert!(runtime.is_running("display"));
        assert!(runtime.display().is_some());
    }

    #[tokio::test]
    async fn test_start_twice_reports_already_running() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("display start", &mut conversation).await;
        runtime.send("display start", &mut conversation).await;

        assert_eq!(
            texts(&conversation).last().map(String::as_str),
            Some("Agent [display] is already running.")
        );
    }

    #[tokio::test]
    async fn test_dispatch_to_stopped_agent_does_not_mutate() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        runtime.watch("display", move |_| *counter.lock() += 1);

        runtime
            .send("display set-my-color red", &mut conversation)
            .await;

        assert_eq!(
            texts(&conversation),
            vec!["Command [set-my-color] could not be sent. Agent [display] is stopped"]
        );
        assert!(runtime.state("display").is_none());
        assert_eq!(*notified.lock(), 0);
    }

    #[tokio::test]
    async fn test_stop_clears_state_and_notifies_none() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);
        let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        runtime.watch("display", move |state| sink.lock().push(state.is_some()));

        runtime.send("display start", &mut conversation).await;
        runtime.send("display stop", &mut conversation).await;

        assert!(!runtime.is_running("display"));
        assert_eq!(*seen.lock(), vec![true, false]);
        let texts = texts(&conversation);
        assert!(texts.contains(&"Stopping agent [display]...".to_string()));
        assert_eq!(texts.last().map(String::as_str), Some("Agent [display] has stopped"));

        runtime.send("display stop", &mut conversation).await;
        assert_eq!(
            self::texts(&conversation).last().map(String::as_str),
            Some("Agent [display] is already stopped.")
        );
    }

    #[tokio::test]
    async fn test_unwatch_stops_notifications() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        let id = runtime.watch("display", move |_| *counter.lock() += 1);

        runtime.send("display start", &mut conversation).await;
        assert!(runtime.unwatch("display", id));
        runtime.send("display stop", &mut conversation).await;

        assert_eq!(*notified.lock(), 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_name() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("ghost start", &mut conversation).await;

        assert_eq!(
            texts(&conversation),
            vec!["Unrecognized agent name [ghost]. You may need to load the agent manually"]
        );
    }

    #[tokio::test]
    async fn test_missing_agent_command() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("display", &mut conversation).await;

        assert!(texts(&conversation)[0].starts_with("Missing command for agent [display]"));
    }

    #[tokio::test]
    async fn test_failing_step_is_a_no_op() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("broken start", &mut conversation).await;
        let before = conversation.message_count();
        runtime.send("broken explode", &mut conversation).await;

        assert_eq!(conversation.message_count(), before);
        assert!(runtime.is_running("broken"));
    }

    #[tokio::test]
    async fn test_timed_out_step_is_a_no_op() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("broken start", &mut conversation).await;
        let before = conversation.message_count();
        runtime.send("broken hang", &mut conversation).await;

        assert_eq!(conversation.message_count(), before);
        assert!(runtime.is_running("broken"));
    }

    #[tokio::test]
    async fn test_terminating_step_stops_agent() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("broken start", &mut conversation).await;
        runtime.send("broken quit", &mut conversation).await;

        assert!(!runtime.is_running("broken"));
        let texts = texts(&conversation);
        assert_eq!(
            &texts[texts.len() - 2..],
            &["[broken] - bye", "Agent [broken] has stopped"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_leaves_agent_stopped() {
        let mut runtime = runtime();
        let mut conversation = Conversation::new(ConversationKind::Command, vec![]);

        runtime.send("failing start", &mut conversation).await;

        assert!(!runtime.is_running("failing"));
        assert_eq!(
            texts(&conversation),
            vec!["Starting agent [failing]...", "Agent [failing] has stopped"]
        );
    }
}
