//! Display agent - owns the colours used to render users and commands

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::{expect_state, Agent, AgentContext, AgentState, AgentStep};
use crate::colors::is_valid_color;
use crate::constants::{agents::DISPLAY, colors, users::LOCAL_USERNAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub my_display_name: String,
    pub my_color: String,
    pub sys_color: String,
    pub cmd_color: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            my_display_name: LOCAL_USERNAME.to_string(),
            my_color: colors::SELF_COLOR.to_string(),
            sys_color: colors::SYSTEM_COLOR.to_string(),
            cmd_color: colors::COMMAND_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ColorTarget {
    Mine,
    System,
    Command,
}

impl ColorTarget {
    fn confirmation(self, color: &str) -> String {
        match self {
            ColorTarget::Mine => format!("Your display color has been set to '{color}'"),
            ColorTarget::System => format!("System display color has been set to '{color}'"),
            ColorTarget::Command => format!("Command display color has been set to '{color}'"),
        }
    }
}

pub struct DisplayAgent;

impl DisplayAgent {
    fn set_color(state: &DisplayState, target: ColorTarget, args: &[String]) -> AgentStep {
        let color = args.first().map(String::as_str).unwrap_or_default();

        if !is_valid_color(color) {
            return AgentStep::reply(
                format!("Unable to set color. '{color}' is not a recognized color"),
                AgentState::Display(state.clone()),
            );
        }

        let mut next = state.clone();
        match target {
            ColorTarget::Mine => next.my_color = color.to_string(),
            ColorTarget::System => next.sys_color = color.to_string(),
            ColorTarget::Command => next.cmd_color = color.to_string(),
        }

        AgentStep::reply(target.confirmation(color), AgentState::Display(next))
    }
}

#[async_trait]
impl Agent for DisplayAgent {
    fn name(&self) -> &str {
        DISPLAY
    }

    fn description(&self) -> &str {
        "Colours used to render users, system output, and commands"
    }

    async fn start(&self, _args: &[String], _ctx: &AgentContext) -> anyhow::Result<AgentStep> {
        Ok(AgentStep::reply(
            "Display agent started successfully",
            AgentState::Display(DisplayState::default()),
        ))
    }

    async fn handle(
        &self,
        state: &AgentState,
        command: &str,
        args: &[String],
        _ctx: &AgentContext,
    ) -> anyhow::Result<AgentStep> {
        let state = expect_state!(state, Display);

        let step = match command {
            "set-my-color" => Self::set_color(state, ColorTarget::Mine, args),
            "set-sys-color" => Self::set_color(state, ColorTarget::System, args),
            "set-cmd-color" => Self::set_color(state, ColorTarget::Command, args),
            "stop" => AgentStep::silent(AgentState::Display(state.clone())),
            other => AgentStep::reply(
                super::unknown_command(other),
                AgentState::Display(state.clone()),
            ),
        };
        Ok(step)
    }
}
