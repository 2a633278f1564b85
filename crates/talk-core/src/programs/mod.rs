//! Built-in programs and commands

mod account;
mod colors;
mod commands;
mod friends;
mod utilities;

use std::sync::Arc;

use crate::agents::RemoteServerState;
use crate::constants::agents::REMOTE_SERVER;
use crate::controller::Session;
use crate::error::TalkError;
use crate::http::HttpError;
use crate::program::{Program, ProgramFactory, ProgramRegistry, ProgramStep};

pub use account::{Login, Register, SetServer};
pub use colors::{ColorTarget, SetColor};
pub use commands::{Clear, Epoch, Intro, ListCommands};
pub use friends::{AddFriend, Chat};
pub use utilities::{DateFormat, GenerateUuids, PrettyJson, MAX_UUIDS};

/// Factory for programs built from a plain constructor
struct Spawner {
    name: &'static str,
    description: &'static str,
    spawn: fn() -> Box<dyn Program>,
}

impl ProgramFactory for Spawner {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn spawn(&self) -> Box<dyn Program> {
        (self.spawn)()
    }
}

fn spawner(
    name: &'static str,
    description: &'static str,
    spawn: fn() -> Box<dyn Program>,
) -> Arc<dyn ProgramFactory> {
    Arc::new(Spawner {
        name,
        description,
        spawn,
    })
}

/// Registry holding every built-in program
pub fn builtin() -> ProgramRegistry {
    let mut registry = ProgramRegistry::new();

    registry.register_command(Arc::new(Clear));
    registry.register_command(Arc::new(Intro));
    registry.register_command(Arc::new(ListCommands));
    registry.register_command(Arc::new(Epoch));

    registry.register_program(spawner(
        "date-fmt",
        "Display the current date time in a strftime format",
        || Box::new(DateFormat::default()),
    ));
    registry.register_program(spawner(
        "pretty-json",
        "Pretty print a string of JSON",
        || Box::new(PrettyJson::default()),
    ));
    registry.register_program(spawner(
        "uuid",
        "Generate a number of V4 UUIDs",
        || Box::new(GenerateUuids::default()),
    ));
    registry.register_program(spawner("set-clr", "Change your display colour", || {
        Box::new(SetColor::new(ColorTarget::Mine))
    }));
    registry.register_program(spawner(
        "set-sys-clr",
        "Change the system display colour",
        || Box::new(SetColor::new(ColorTarget::System)),
    ));
    registry.register_program(spawner(
        "set-cmd-clr",
        "Change the command display colour",
        || Box::new(SetColor::new(ColorTarget::Command)),
    ));
    registry.register_program(spawner(
        "set-svr",
        "Connect to a chat server by domain",
        || Box::new(SetServer::default()),
    ));
    registry.register_program(spawner(
        "register",
        "Create an account on the chat server",
        || Box::new(Register::default()),
    ));
    registry.register_program(spawner(
        "login",
        "Sign in to your account on the chat server",
        || Box::new(Login::default()),
    ));
    registry.register_program(spawner(
        "add-friend",
        "Send a friend request to another user",
        || Box::new(AddFriend::default()),
    ));
    registry.register_program(spawner(
        "chat",
        "Open a conversation with a friend",
        || Box::new(Chat::default()),
    ));

    registry
}

/// User-facing text for a failed request
pub(crate) fn request_failure(err: HttpError) -> String {
    match TalkError::from(err) {
        TalkError::Transport {
            status: Some(_),
            message,
        } => message,
        other => format!(
            "Something went wrong while making the request, please try again later.\n\n{other}"
        ),
    }
}

/// Snapshot of the remote-server agent's state, or the step that reports it missing
pub(crate) fn remote_server(session: &Session) -> Result<RemoteServerState, ProgramStep> {
    session.remote_server().cloned().ok_or_else(|| {
        ProgramStep::finish(format!(
            "The '{REMOTE_SERVER}' agent is not currently started"
        ))
    })
}

/// Quote a server-supplied value so it reaches an agent as one argument.
/// Values containing `"` cannot be quoted and are refused.
pub(crate) fn agent_argument(value: &str) -> Result<String, ProgramStep> {
    if value.is_empty() || value.contains('"') {
        return Err(ProgramStep::finish(format!(
            "The server returned a name that cannot be used: {value}"
        )));
    }
    Ok(format!("\"{value}\""))
}

/// Prefix `scheme://` unless the address already names one
pub(crate) fn with_scheme(address: &str, scheme: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("{scheme}://{address}")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::TalkConfig;
    use crate::controller::Controller;
    use crate::testing::{RecordingConnector, ScriptedHttpClient};

    pub(crate) struct Harness {
        pub controller: Controller,
        pub http: Arc<ScriptedHttpClient>,
        pub sockets: Arc<RecordingConnector>,
    }

    impl Harness {
        pub async fn new() -> Self {
            Self::with_config(TalkConfig {
                show_intro: false,
                ..Default::default()
            })
            .await
        }

        pub async fn with_config(config: TalkConfig) -> Self {
            let http = ScriptedHttpClient::new();
            let sockets = Arc::new(RecordingConnector::default());
            let (controller, _notices) =
                Controller::new(config, http.clone(), sockets.clone()).await;
            Self {
                controller,
                http,
                sockets,
            }
        }

        pub async fn send(&mut self, line: &str) {
            self.controller.send_message(line).await;
        }

        pub fn last_text(&self) -> String {
            self.controller
                .current_conversation()
                .messages()
                .last()
                .map(|m| m.text.clone())
                .unwrap_or_default()
        }

        pub fn texts(&self) -> Vec<String> {
            self.controller
                .current_conversation()
                .messages()
                .map(|m| m.text.clone())
                .collect()
        }

        pub async fn with_server(mut self) -> Self {
            self.send("agent-ctl remote-server change-server http://api ws://sock")
                .await;
            self
        }

        pub async fn signed_in(self) -> Self {
            let mut harness = self.with_server().await;
            harness
                .send("agent-ctl remote-server connect u1 tok ref")
                .await;
            harness
                .send(r#"agent-ctl remote-server set-profile --json {"user_id":"u1","username":"alice","friends":[{"user_id":"u2","username":"bob"}]}"#)
                .await;
            harness.send("agent-ctl users add-user u1 alice teal").await;
            harness
        }
    }
}
