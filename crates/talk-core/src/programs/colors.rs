//! `set-clr`, `set-sys-clr`, `set-cmd-clr`
//!
//! The display agent owns the palette; these programs validate the colour
//! and forward it.

use async_trait::async_trait;

use crate::colors::is_valid_color;
use crate::constants::agents::DISPLAY;
use crate::controller::Session;
use crate::program::{EntryOptions, Program, ProgramOutput, ProgramStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTarget {
    Mine,
    System,
    Command,
}

impl ColorTarget {
    fn prompt(self) -> &'static str {
        match self {
            ColorTarget::Mine => "Please choose a colour for your own user messages",
            ColorTarget::System => "Please choose a colour for the system user",
            ColorTarget::Command => "Please choose a colour for command messages",
        }
    }

    fn agent_command(self) -> &'static str {
        match self {
            ColorTarget::Mine => "set-my-color",
            ColorTarget::System => "set-sys-color",
            ColorTarget::Command => "set-cmd-color",
        }
    }

    fn confirmation(self, color: &str) -> String {
        match self {
            ColorTarget::Mine => format!("Your display colour is set to {color}"),
            ColorTarget::System => format!("System display colour is set to {color}"),
            ColorTarget::Command => format!("Command display colour is set to {color}"),
        }
    }
}

#[derive(Debug)]
pub struct SetColor {
    target: ColorTarget,
    prompted: bool,
}

impl SetColor {
    pub fn new(target: ColorTarget) -> Self {
        Self {
            target,
            prompted: false,
        }
    }
}

#[async_trait]
impl Program for SetColor {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let Some(color) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::ask(
                self.target.prompt(),
                EntryOptions::labelled("Colour"),
            ));
        };

        let color = color.trim();
        if !is_valid_color(color) {
            return Ok(ProgramStep::Suspended(
                ProgramOutput::retry("Colour is invalid, please choose another colour")
                    .with_entry(EntryOptions::labelled("Colour")),
            ));
        }

        if !session.agents().is_running(DISPLAY) {
            return Ok(ProgramStep::finish(format!(
                "The '{DISPLAY}' agent is not currently started"
            )));
        }

        session
            .send_agent_command(&format!("{DISPLAY} {} {color}", self.target.agent_command()))
            .await;

        Ok(ProgramStep::finish(self.target.confirmation(color)))
    }
}

#[cfg(test)]
mod tests {
    use crate::programs::test_support::Harness;

    #[tokio::test]
    async fn test_set_sys_clr_updates_display_agent() {
        let mut harness = Harness::new().await;

        harness.send("set-sys-clr").await;
        assert_eq!(harness.last_text(), "Please choose a colour for the system user");

        harness.send("Indigo").await;
        let display = harness.controller.session().display().unwrap();
        assert_eq!(display.sys_color, "Indigo");
        let texts = harness.texts();
        assert_eq!(
            &texts[texts.len() - 2..],
            &[
                "[display] - System display color has been set to 'Indigo'",
                "System display colour is set to Indigo"
            ]
        );
    }

    #[tokio::test]
    async fn test_set_cmd_clr_retries_until_valid() {
        let mut harness = Harness::new().await;

        harness.send("set-cmd-clr nope").await;
        assert!(harness.controller.is_executing());
        assert!(!harness.controller.entry_options().masked);

        harness.send("#0af").await;
        assert!(!harness.controller.is_executing());
        assert_eq!(harness.controller.session().display().unwrap().cmd_color, "#0af");
    }

    #[tokio::test]
    async fn test_set_clr_without_display_agent() {
        let mut harness = Harness::new().await;
        harness.controller.stop_agent("display").await;

        harness.send("set-clr red").await;

        assert_eq!(
            harness.last_text(),
            "The 'display' agent is not currently started"
        );
    }
}
