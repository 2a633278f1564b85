//! Interactive prompt
//!
//! A raw-mode line editor on top of the controller. Agent notices from
//! background work are interleaved with keyboard input.

use anyhow::Result;
use crossterm::{
    cursor::MoveToColumn,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use futures::StreamExt;
use std::io::{self, Stdout, Write};
use tokio::sync::mpsc;
use uuid::Uuid;

use talk_core::{AgentNotice, Controller};

use crate::render;

/// What a key press asks the loop to do
enum KeyAction {
    Continue,
    Submit(String),
    Exit,
}

pub struct Repl {
    controller: Controller,
    notices: mpsc::UnboundedReceiver<AgentNotice>,
    buffer: String,
    /// Position while browsing history with the arrow keys
    history_cursor: Option<usize>,
    shown_conversation: Option<Uuid>,
    shown_messages: usize,
}

impl Repl {
    pub fn new(controller: Controller, notices: mpsc::UnboundedReceiver<AgentNotice>) -> Self {
        Self {
            controller,
            notices,
            buffer: String::new(),
            history_cursor: None,
            shown_conversation: None,
            shown_messages: 0,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        let result = self.event_loop().await;
        terminal::disable_raw_mode()?;
        println!();
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        let mut events = EventStream::new();

        self.redraw(&mut stdout)?;

        loop {
            tokio::select! {
                Some(notice) = self.notices.recv() => {
                    self.controller.receive_agent_notice(notice);
                }
                maybe_event = events.next() => {
                    let Some(event) = maybe_event else { break };
                    let Event::Key(key) = event? else { continue };

                    match self.handle_key(key) {
                        KeyAction::Continue => {}
                        KeyAction::Submit(line) => {
                            self.clear_prompt(&mut stdout)?;
                            self.controller.send_message(&line).await;
                        }
                        KeyAction::Exit => break,
                    }
                }
            }

            self.redraw(&mut stdout)?;
        }

        tracing::info!("Prompt closed");
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                if self.controller.is_executing() {
                    self.buffer.clear();
                    self.controller.cancel_execution();
                    return KeyAction::Continue;
                }
                return KeyAction::Exit;
            }
            KeyCode::Char('d') if ctrl && self.buffer.is_empty() => return KeyAction::Exit,
            KeyCode::Char('u') if ctrl => self.buffer.clear(),
            KeyCode::Char(c) if !ctrl => self.buffer.push(c),
            KeyCode::Backspace => {
                self.buffer.pop();
            }
            KeyCode::Esc => {
                self.buffer.clear();
                self.controller.cancel_execution();
            }
            KeyCode::Up => self.browse_history(true),
            KeyCode::Down => self.browse_history(false),
            KeyCode::Enter => {
                self.history_cursor = None;
                let line = std::mem::take(&mut self.buffer);
                if !line.trim().is_empty() {
                    return KeyAction::Submit(line);
                }
            }
            _ => {}
        }
        KeyAction::Continue
    }

    fn browse_history(&mut self, older: bool) {
        if self.controller.entry_options().masked {
            return;
        }
        let history = self.controller.history();
        if history.is_empty() {
            return;
        }

        let cursor = match (self.history_cursor, older) {
            (None, true) => Some(history.len() - 1),
            (None, false) => None,
            (Some(0), true) => Some(0),
            (Some(i), true) => Some(i - 1),
            (Some(i), false) if i + 1 < history.len() => Some(i + 1),
            (Some(_), false) => None,
        };

        self.buffer = cursor.map(|i| history[i].clone()).unwrap_or_default();
        self.history_cursor = cursor;
    }

    fn clear_prompt(&self, stdout: &mut Stdout) -> Result<()> {
        execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        Ok(())
    }

    /// Print messages not shown yet, then the prompt line
    fn redraw(&mut self, stdout: &mut Stdout) -> Result<()> {
        queue!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))?;

        let conversation = self.controller.current_conversation();
        let count = conversation.message_count();

        if self.shown_conversation != Some(conversation.id) {
            if self.shown_conversation.is_some() {
                queue!(
                    stdout,
                    Print(format!("--- conversation {} ---\r\n", conversation.id))
                )?;
            }
            self.shown_conversation = Some(conversation.id);
            self.shown_messages = 0;
        } else if count < self.shown_messages {
            queue!(stdout, Print("--- cleared ---\r\n"))?;
            self.shown_messages = 0;
        }

        let session = self.controller.session();
        for message in conversation.messages().skip(self.shown_messages) {
            let (label, color) = render::sender(message, session);
            let line = render::format_line(&label, message);
            queue!(
                stdout,
                SetForegroundColor(color),
                Print(render::raw_newlines(&line)),
                ResetColor,
                Print("\r\n")
            )?;
        }
        self.shown_messages = count;

        let options = self.controller.entry_options();
        let label = options.label.as_deref().unwrap_or("talk");
        let typed = if options.masked {
            "*".repeat(self.buffer.chars().count())
        } else {
            self.buffer.clone()
        };
        queue!(stdout, Print(format!("{label}> {typed}")))?;
        if typed.is_empty() {
            if let Some(placeholder) = &options.placeholder {
                queue!(
                    stdout,
                    SetForegroundColor(crossterm::style::Color::DarkGrey),
                    Print(placeholder),
                    ResetColor,
                    MoveToColumn((label.chars().count() + 2) as u16)
                )?;
            }
        }

        stdout.flush()?;
        Ok(())
    }
}
