//! Text utilities: date formatting, JSON pretty printing, UUIDs

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use serde_json::Value;
use uuid::Uuid;

use crate::controller::Session;
use crate::program::{EntryOptions, Program, ProgramOutput, ProgramStep};

/// Upper bound for a single `uuid` invocation
pub const MAX_UUIDS: usize = 1000;

#[derive(Debug, Default)]
pub struct DateFormat {
    prompted: bool,
}

#[async_trait]
impl Program for DateFormat {
    async fn step(
        &mut self,
        input: Option<String>,
        _session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let Some(format) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::ask(
                "Enter the date format you want to use",
                EntryOptions::labelled("Date Format"),
            ));
        };

        Ok(ProgramStep::finish(format_now(&format)))
    }
}

fn format_now(format: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return format!(
            "Invalid format, date could not be written:\n\n '{format}' contains an unknown specifier"
        );
    }

    Local::now().format_with_items(items.into_iter()).to_string()
}

#[derive(Debug, Default)]
pub struct PrettyJson {
    prompted: bool,
}

#[async_trait]
impl Program for PrettyJson {
    async fn step(
        &mut self,
        input: Option<String>,
        _session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let Some(content) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::ask(
                "Enter your JSON content",
                EntryOptions::labelled("JSON Content"),
            ));
        };

        let message = match serde_json::from_str::<Value>(&content)
            .and_then(|value| serde_json::to_string_pretty(&value))
        {
            Ok(pretty) => format!("JSON Output:\n\n{pretty}"),
            Err(_) => "Invalid JSON, could not be parsed".to_string(),
        };
        Ok(ProgramStep::finish(message))
    }
}

#[derive(Debug, Default)]
pub struct GenerateUuids {
    prompted: bool,
}

impl GenerateUuids {
    fn entry() -> EntryOptions {
        EntryOptions::labelled("UUID Count")
    }
}

#[async_trait]
impl Program for GenerateUuids {
    async fn step(
        &mut self,
        input: Option<String>,
        _session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let Some(raw) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::ask(
                "How many UUIDs do you want to generate?",
                Self::entry(),
            ));
        };

        let count = match raw.trim().parse::<usize>() {
            Ok(count) if count <= MAX_UUIDS => count,
            _ => {
                return Ok(ProgramStep::Suspended(
                    ProgramOutput::retry("Please enter a number of UUIDs to generate")
                        .with_entry(Self::entry()),
                ))
            }
        };

        let ids: Vec<String> = (0..count)
            .map(|_| format!("* {}", Uuid::new_v4()))
            .collect();
        Ok(ProgramStep::finish(format!(
            "Generated {count} UUIDs:\n\n{}",
            ids.join("\n")
        )))
    }
}
