//! Programs and commands
//!
//! A program is an explicit state machine that prompts for successive
//! inputs. A command is the one-shot case. Both are resolved by name
//! through [`ProgramRegistry`] and driven by [`ProgramEngine`].

pub mod engine;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::controller::Session;

pub use engine::{Launch, ProgramEngine};

/// How the next line of input should be collected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Echo `*` instead of the typed text and keep it out of history
    pub masked: bool,
    pub label: Option<String>,
    pub placeholder: Option<String>,
}

impl EntryOptions {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn secret(label: impl Into<String>) -> Self {
        Self {
            masked: true,
            label: Some(label.into()),
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

/// What a program reports at a suspension point or on completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOutput {
    pub message: Option<String>,
    /// False when the last input was rejected and the prompt repeats
    pub is_valid_yield: bool,
    pub next_entry_options: Option<EntryOptions>,
}

impl ProgramOutput {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            is_valid_yield: true,
            next_entry_options: None,
        }
    }

    pub fn silent() -> Self {
        Self {
            message: None,
            is_valid_yield: true,
            next_entry_options: None,
        }
    }

    pub fn prompt(message: impl Into<String>, options: EntryOptions) -> Self {
        Self::text(message).with_entry(options)
    }

    /// Re-prompt after rejected input
    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            is_valid_yield: false,
            ..Self::text(message)
        }
    }

    pub fn with_entry(mut self, options: EntryOptions) -> Self {
        self.next_entry_options = Some(options);
        self
    }

    pub fn requests_mask(&self) -> bool {
        self.next_entry_options
            .as_ref()
            .is_some_and(|options| options.masked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStep {
    /// Waiting for the next input
    Suspended(ProgramOutput),
    Done(ProgramOutput),
}

impl ProgramStep {
    pub fn output(&self) -> &ProgramOutput {
        match self {
            ProgramStep::Suspended(output) | ProgramStep::Done(output) => output,
        }
    }

    pub fn into_output(self) -> ProgramOutput {
        match self {
            ProgramStep::Suspended(output) | ProgramStep::Done(output) => output,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ProgramStep::Done(_))
    }

    pub fn finish(message: impl Into<String>) -> Self {
        ProgramStep::Done(ProgramOutput::text(message))
    }

    pub fn ask(message: impl Into<String>, options: EntryOptions) -> Self {
        ProgramStep::Suspended(ProgramOutput::prompt(message, options))
    }
}

/// A running multi-step program
#[async_trait]
pub trait Program: Send {
    /// Advance once. The first call receives `None`; every later call
    /// receives exactly one line of input.
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep>;
}

/// Creates a fresh program instance per invocation
pub trait ProgramFactory: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn spawn(&self) -> Box<dyn Program>;
}

/// One-shot command
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, session: &mut Session) -> anyhow::Result<ProgramOutput>;
}

#[derive(Clone)]
pub enum Runnable {
    Command(Arc<dyn Command>),
    Program(Arc<dyn ProgramFactory>),
}

impl Runnable {
    pub fn name(&self) -> &str {
        match self {
            Runnable::Command(command) => command.name(),
            Runnable::Program(factory) => factory.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Runnable::Command(command) => command.description(),
            Runnable::Program(factory) => factory.description(),
        }
    }
}

/// Registry of runnable programs keyed by name
#[derive(Default, Clone)]
pub struct ProgramRegistry {
    programs: HashMap<String, Runnable>,
}

impl std::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("programs", &self.names())
            .finish()
    }
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&mut self, command: Arc<dyn Command>) {
        let name = command.name().to_string();
        self.programs.insert(name, Runnable::Command(command));
    }

    pub fn register_program(&mut self, factory: Arc<dyn ProgramFactory>) {
        let name = factory.name().to_string();
        self.programs.insert(name, Runnable::Program(factory));
    }

    pub fn get(&self, name: &str) -> Option<Runnable> {
        self.programs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `(name, description)` pairs sorted by name
    pub fn catalog(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .programs
            .values()
            .map(|r| (r.name().to_string(), r.description().to_string()))
            .collect();
        entries.sort();
        entries
    }
}
