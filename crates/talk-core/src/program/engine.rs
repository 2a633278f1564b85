//! Single-flight program driver
//!
//! At most one program executes at a time. While one is executing every
//! line of input resumes it; otherwise a line names a program to launch.

use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{EntryOptions, Program, ProgramStep, Runnable};
use crate::controller::Session;

pub const INVALID_COMMAND: &str =
    "Invalid command. Type 'commands' for a list of available commands";

/// What a launch resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    Unknown,
    Command,
    Program,
}

struct Execution {
    name: String,
    program: Box<dyn Program>,
}

pub struct ProgramEngine {
    execution: Option<Execution>,
    entry_options: EntryOptions,
    step_timeout: Duration,
}

impl std::fmt::Debug for ProgramEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramEngine")
            .field("executing", &self.current_program())
            .field("entry_options", &self.entry_options)
            .finish()
    }
}

impl ProgramEngine {
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            execution: None,
            entry_options: EntryOptions::default(),
            step_timeout,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.execution.is_some()
    }

    pub fn current_program(&self) -> Option<&str> {
        self.execution.as_ref().map(|e| e.name.as_str())
    }

    pub fn entry_options(&self) -> &EntryOptions {
        &self.entry_options
    }

    /// Drop the running program, if any
    pub fn cancel(&mut self) {
        if let Some(execution) = self.execution.take() {
            info!(program = %execution.name, "Program cancelled");
        }
        self.entry_options = EntryOptions::default();
    }

    /// Resolve `name` and run it, feeding `args` while the program accepts them
    pub async fn launch(&mut self, name: &str, args: Vec<String>, session: &mut Session) -> Launch {
        let Some(runnable) = session.programs().get(name) else {
            debug!(program = name, "Unknown program");
            session.post_system(INVALID_COMMAND);
            return Launch::Unknown;
        };

        match runnable {
            Runnable::Command(command) => {
                info!(program = name, "Running command");
                let result = tokio::time::timeout(self.step_timeout, command.run(session)).await;
                match result {
                    Ok(Ok(output)) => {
                        if let Some(message) = output.message.filter(|m| !m.is_empty()) {
                            session.post_system(message);
                        }
                    }
                    Ok(Err(e)) => {
                        error!(program = name, "Command failed: {:#}", e);
                        session.post_system(format!("Command '{name}' failed: {e:#}"));
                    }
                    Err(_) => {
                        warn!(program = name, "Command timed out");
                        session.post_system(format!(
                            "Command '{name}' failed: {}",
                            timeout_reason(self.step_timeout)
                        ));
                    }
                }
                Launch::Command
            }
            Runnable::Program(factory) => {
                info!(program = name, args = args.len(), "Starting program");
                self.execution = Some(Execution {
                    name: name.to_string(),
                    program: factory.spawn(),
                });

                let mut pending: VecDeque<String> = args.into();
                let mut input = None;
                loop {
                    let Some(step) = self.step(input.take(), session).await else {
                        return Launch::Program;
                    };

                    let output = step.output();
                    let accepts_argument =
                        !step.is_done() && output.is_valid_yield && !output.requests_mask();

                    match pending.pop_front() {
                        Some(argument) if accepts_argument => input = Some(argument),
                        _ => {
                            self.settle(step, session);
                            return Launch::Program;
                        }
                    }
                }
            }
        }
    }

    /// Deliver one line of input to the running program
    pub async fn resume(&mut self, input: String, session: &mut Session) {
        if let Some(step) = self.step(Some(input), session).await {
            self.settle(step, session);
        }
    }

    async fn step(&mut self, input: Option<String>, session: &mut Session) -> Option<ProgramStep> {
        let step_timeout = self.step_timeout;
        let execution = self.execution.as_mut()?;

        let result =
            tokio::time::timeout(step_timeout, execution.program.step(input, session)).await;

        let reason = match result {
            Ok(Ok(step)) => return Some(step),
            Ok(Err(e)) => {
                error!(program = %execution.name, "Program step failed: {:#}", e);
                format!("{e:#}")
            }
            Err(_) => {
                warn!(program = %execution.name, "Program step timed out");
                timeout_reason(step_timeout)
            }
        };

        let name = execution.name.clone();
        self.execution = None;
        self.entry_options = EntryOptions::default();
        session.post_system(format!("Command '{name}' failed: {reason}"));
        None
    }

    /// Surface the last output and publish the entry options it requests
    fn settle(&mut self, step: ProgramStep, session: &mut Session) {
        let done = step.is_done();
        let output = step.into_output();

        if let Some(message) = output.message.filter(|m| !m.is_empty()) {
            session.post_system(message);
        }

        if done {
            if let Some(execution) = self.execution.take() {
                info!(program = %execution.name, "Program finished");
            }
            self.entry_options = EntryOptions::default();
        } else {
            self.entry_options = output.next_entry_options.unwrap_or_default();
        }
    }
}

fn timeout_reason(timeout: Duration) -> String {
    format!("timed out after {}s", timeout.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRuntime;
    use crate::config::TalkConfig;
    use crate::program::{ProgramFactory, ProgramRegistry};
    use crate::testing::{agent_context, ScriptedHttpClient};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Asks for two values in turn, then reports both
    #[derive(Default)]
    struct TwoPrompts {
        first: Option<String>,
        asked: bool,
    }

    #[async_trait]
    impl Program for TwoPrompts {
        async fn step(
            &mut self,
            input: Option<String>,
            _session: &mut Session,
        ) -> anyhow::Result<ProgramStep> {
            match (input.filter(|_| self.asked), self.first.take()) {
                (None, _) => {
                    self.asked = true;
                    Ok(ProgramStep::ask("First?", EntryOptions::labelled("First")))
                }
                (Some(first), None) => {
                    self.first = Some(first);
                    Ok(ProgramStep::ask("Second?", EntryOptions::labelled("Second")))
                }
                (Some(second), Some(first)) => {
                    Ok(ProgramStep::finish(format!("got {first},{second}")))
                }
            }
        }
    }

    /// Prompts once, then fails on any input
    struct Exploding;

    #[async_trait]
    impl Program for Exploding {
        async fn step(
            &mut self,
            input: Option<String>,
            _session: &mut Session,
        ) -> anyhow::Result<ProgramStep> {
            match input {
                None => Ok(ProgramStep::ask("Go?", EntryOptions::labelled("Go"))),
                Some(_) => anyhow::bail!("backend exploded"),
            }
        }
    }

    /// Prompts once, then never answers
    struct Sleepy;

    #[async_trait]
    impl Program for Sleepy {
        async fn step(
            &mut self,
            input: Option<String>,
            _session: &mut Session,
        ) -> anyhow::Result<ProgramStep> {
            if input.is_none() {
                return Ok(ProgramStep::ask("Wait?", EntryOptions::secret("Wait")));
            }
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ProgramStep::finish("woke"))
        }
    }

    struct Factory {
        name: &'static str,
        spawn: fn() -> Box<dyn Program>,
    }

    impl ProgramFactory for Factory {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test program"
        }

        fn spawn(&self) -> Box<dyn Program> {
            (self.spawn)()
        }
    }

    fn session() -> Session {
        let mut programs = ProgramRegistry::new();
        programs.register_program(Arc::new(Factory {
            name: "two",
            spawn: || Box::new(TwoPrompts::default()),
        }));
        programs.register_program(Arc::new(Factory {
            name: "explode",
            spawn: || Box::new(Exploding),
        }));
        programs.register_program(Arc::new(Factory {
            name: "sleepy",
            spawn: || Box::new(Sleepy),
        }));

        let (ctx, _rx, _sockets) = agent_context();
        let config = TalkConfig {
            show_intro: false,
            ..Default::default()
        };
        Session::new(
            config,
            ScriptedHttpClient::new(),
            AgentRuntime::new(ctx, Duration::from_secs(1)),
            programs,
        )
    }

    fn texts(session: &Session) -> Vec<String> {
        session
            .current_conversation()
            .messages()
            .map(|m| m.text.clone())
            .collect()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_queued_arguments_feed_successive_prompts() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        let launch = engine.launch("two", args(&["x", "y", "z"]), &mut session).await;

        assert_eq!(launch, Launch::Program);
        assert_eq!(texts(&session), vec!["got x,y"]);
        assert!(!engine.is_executing());
        assert_eq!(engine.entry_options(), &EntryOptions::default());
    }

    #[tokio::test]
    async fn test_short_argument_list_leaves_program_waiting() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        engine.launch("two", args(&["x"]), &mut session).await;

        assert_eq!(texts(&session), vec!["Second?"]);
        assert_eq!(engine.current_program(), Some("two"));
        assert_eq!(engine.entry_options().label.as_deref(), Some("Second"));

        engine.resume("y".to_string(), &mut session).await;
        assert_eq!(texts(&session).last().map(String::as_str), Some("got x,y"));
        assert!(!engine.is_executing());
    }

    #[tokio::test]
    async fn test_unknown_program_posts_invalid_command() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        let launch = engine.launch("nope", Vec::new(), &mut session).await;

        assert_eq!(launch, Launch::Unknown);
        assert_eq!(texts(&session), vec![INVALID_COMMAND]);
        assert!(!engine.is_executing());
    }

    #[tokio::test]
    async fn test_step_error_clears_execution() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        engine.launch("explode", Vec::new(), &mut session).await;
        assert_eq!(engine.entry_options().label.as_deref(), Some("Go"));

        engine.resume("now".to_string(), &mut session).await;

        assert_eq!(
            texts(&session).last().map(String::as_str),
            Some("Command 'explode' failed: backend exploded")
        );
        assert!(!engine.is_executing());
        assert_eq!(engine.entry_options(), &EntryOptions::default());
    }

    #[tokio::test]
    async fn test_step_error_while_feeding_arguments() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        engine.launch("explode", args(&["now", "later"]), &mut session).await;

        assert_eq!(texts(&session), vec!["Command 'explode' failed: backend exploded"]);
        assert!(!engine.is_executing());
    }

    #[tokio::test]
    async fn test_step_timeout_clears_execution() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_millis(50));

        engine.launch("sleepy", Vec::new(), &mut session).await;
        assert!(engine.entry_options().masked);

        engine.resume("hello".to_string(), &mut session).await;

        let last = texts(&session).pop().unwrap();
        assert!(last.starts_with("Command 'sleepy' failed: timed out after"));
        assert!(!engine.is_executing());
        assert!(!engine.entry_options().masked);
    }

    #[tokio::test]
    async fn test_cancel_resets_entry_options() {
        let mut session = session();
        let mut engine = ProgramEngine::new(Duration::from_secs(5));

        engine.launch("sleepy", Vec::new(), &mut session).await;
        engine.cancel();

        assert!(!engine.is_executing());
        assert_eq!(engine.entry_options(), &EntryOptions::default());
    }
}
