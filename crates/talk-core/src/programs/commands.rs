//! One-shot commands

use async_trait::async_trait;
use chrono::Utc;

use crate::constants::AGENT_CTL;
use crate::controller::Session;
use crate::program::{Command, ProgramOutput};
use crate::users::intro_text;

pub struct Clear;

#[async_trait]
impl Command for Clear {
    fn name(&self) -> &str {
        "clear"
    }

    fn description(&self) -> &str {
        "Clear the current conversation"
    }

    async fn run(&self, session: &mut Session) -> anyhow::Result<ProgramOutput> {
        session.current_conversation_mut().clear();
        Ok(ProgramOutput::text("Conversation cleared"))
    }
}

pub struct Intro;

#[async_trait]
impl Command for Intro {
    fn name(&self) -> &str {
        "intro"
    }

    fn description(&self) -> &str {
        "Show the welcome text"
    }

    async fn run(&self, session: &mut Session) -> anyhow::Result<ProgramOutput> {
        Ok(ProgramOutput::text(intro_text(
            &session.config().command_prefix,
        )))
    }
}

pub struct ListCommands;

#[async_trait]
impl Command for ListCommands {
    fn name(&self) -> &str {
        "commands"
    }

    fn description(&self) -> &str {
        "List every available command"
    }

    async fn run(&self, session: &mut Session) -> anyhow::Result<ProgramOutput> {
        let mut lines: Vec<String> = session
            .programs()
            .catalog()
            .into_iter()
            .map(|(name, description)| format!("* {name} - {description}"))
            .collect();
        lines.push(format!(
            "* {AGENT_CTL} - Start, stop, or send a command to an agent ({})",
            session.agents().names().join(", ")
        ));

        Ok(ProgramOutput::text(format!(
            "Available commands:\n\n{}",
            lines.join("\n")
        )))
    }
}

pub struct Epoch;

#[async_trait]
impl Command for Epoch {
    fn name(&self) -> &str {
        "epoch"
    }

    fn description(&self) -> &str {
        "Current Unix time in milliseconds"
    }

    async fn run(&self, _session: &mut Session) -> anyhow::Result<ProgramOutput> {
        Ok(ProgramOutput::text(Utc::now().timestamp_millis().to_string()))
    }
}
