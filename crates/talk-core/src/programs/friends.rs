//! Friend requests and one-to-one chats

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{agent_argument, remote_server, request_failure};
use crate::agents::{RemoteServerState, UserFriend};
use crate::colors::random_hex_color;
use crate::constants::agents::{REMOTE_SERVER, USERS};
use crate::controller::Session;
use crate::conversation::{Conversation, ConversationKind};
use crate::http::{decode, HttpClient, HttpError};
use crate::program::{EntryOptions, Program, ProgramOutput, ProgramStep};

#[derive(Debug, Deserialize)]
struct AddFriendResponse {
    data: AddFriendData,
}

#[derive(Debug, Deserialize)]
struct AddFriendData {
    friend_data: UserFriend,
    is_reciprocal: bool,
}

/// Requires a signed-in session, returning the API host and access token
fn signed_in(server: &RemoteServerState, action: &str) -> Result<(String, String), ProgramStep> {
    let Some(api) = server.api_host() else {
        return Err(ProgramStep::finish(format!(
            "You must be connected to a server before you can {action}. Run the `set-svr` command to connect."
        )));
    };
    match server.access_token().filter(|_| server.is_authenticated()) {
        Some(token) => Ok((api.to_string(), token.to_string())),
        None => Err(ProgramStep::finish(format!(
            "You must be logged in to the server before you can {action}. Run the `login` command to log in to your account"
        ))),
    }
}

#[derive(Debug, Default)]
pub struct AddFriend {
    prompted: bool,
}

impl AddFriend {
    fn prompt() -> ProgramOutput {
        ProgramOutput::prompt(
            "Enter the username of friend you want to add",
            EntryOptions::labelled("Friends username"),
        )
    }

    async fn request(
        http: &dyn HttpClient,
        api: &str,
        token: &str,
        username: &str,
    ) -> Result<AddFriendData, HttpError> {
        let body = json!({ "username": username });
        let response: AddFriendResponse =
            decode(http.post_json(&format!("{api}/add-friend"), &body, Some(token)).await?)?;
        Ok(response.data)
    }
}

#[async_trait]
impl Program for AddFriend {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let server = match remote_server(session) {
            Ok(server) => server,
            Err(step) => return Ok(step),
        };
        let (api, token) = match signed_in(&server, "add friends") {
            Ok(credentials) => credentials,
            Err(step) => return Ok(step),
        };

        let Some(username) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::Suspended(Self::prompt()));
        };
        let username = username.trim();
        if username.is_empty() {
            return Ok(ProgramStep::Suspended(Self::prompt()));
        }

        let http = session.http();
        let data = match Self::request(http.as_ref(), &api, &token, username).await {
            Ok(data) => data,
            Err(e) => return Ok(ProgramStep::finish(request_failure(e))),
        };

        let friend = data.friend_data;
        info!(friend = %friend.user_id, reciprocal = data.is_reciprocal, "Friend request sent");
        let (friend_id, friend_name) = match (
            agent_argument(&friend.user_id),
            agent_argument(&friend.username),
        ) {
            (Ok(id), Ok(name)) => (id, name),
            (Err(step), _) | (_, Err(step)) => return Ok(step),
        };
        session
            .send_agent_command(&format!(
                "{REMOTE_SERVER} add-friend {friend_id} {friend_name}"
            ))
            .await;

        Ok(ProgramStep::finish(if data.is_reciprocal {
            format!(
                "You are now friends with {0}. Start a chat with 'chat {0}'.",
                friend.username
            )
        } else {
            format!(
                "A connection invite has been sent to {}. Once they have accepted you will be able to chat",
                friend.username
            )
        }))
    }
}

#[derive(Debug, Default)]
pub struct Chat {
    prompted: bool,
}

#[async_trait]
impl Program for Chat {
    async fn step(
        &mut self,
        input: Option<String>,
        session: &mut Session,
    ) -> anyhow::Result<ProgramStep> {
        let server = match remote_server(session) {
            Ok(server) => server,
            Err(step) => return Ok(step),
        };
        if let Err(step) = signed_in(&server, "chat") {
            return Ok(step);
        }
        if server.profile.is_none() {
            return Ok(ProgramStep::finish(
                "Your profile is not available. Try logging in again to reset your profile",
            ));
        }

        let Some(username) = input.filter(|_| self.prompted) else {
            self.prompted = true;
            return Ok(ProgramStep::ask(
                "Enter the username of the user you want to chat to",
                EntryOptions::labelled("Username"),
            ));
        };

        let Some(friend) = server.find_friend(username.trim()).cloned() else {
            return Ok(ProgramStep::finish(
                "The username entered is not in your friends list. Run the `add-friend` command to correct this.",
            ));
        };

        let known = session
            .users()
            .is_some_and(|users| users.get(&friend.user_id).is_some());
        if !known {
            let (friend_id, friend_name) = match (
                agent_argument(&friend.user_id),
                agent_argument(&friend.username),
            ) {
                (Ok(id), Ok(name)) => (id, name),
                (Err(step), _) | (_, Err(step)) => return Ok(step),
            };
            session
                .send_agent_command(&format!(
                    "{USERS} add-user {friend_id} {friend_name} {}",
                    random_hex_color()
                ))
                .await;
        }
        if session
            .users()
            .and_then(|users| users.get(&friend.user_id))
            .is_none()
        {
            return Ok(ProgramStep::finish(
                "Couldn't obtain the user from the users service",
            ));
        }

        let me = session.current_user();
        let conversation = Conversation::new(
            ConversationKind::Standard,
            vec![me.user_id, friend.user_id.clone()],
        );
        let id = session.add_conversation(conversation);
        session.switch_conversation(id)?;
        info!(conversation = %id, friend = %friend.user_id, "Chat opened");

        Ok(ProgramStep::finish("Conversation created"))
    }
}
