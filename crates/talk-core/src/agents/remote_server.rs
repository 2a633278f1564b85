//! Remote server agent
//!
//! Holds the chat server's host settings, the session tokens, the signed-in
//! profile, and the realtime connection. The connection reports its own
//! lifecycle through the agent context's notice channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::agent::{expect_state, Agent, AgentContext, AgentState, AgentStep};
use crate::constants::agents::REMOTE_SERVER;
use crate::socket::SocketHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    pub api: String,
    pub socket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFriend {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUserProfile {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub friends: Vec<UserFriend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteServerState {
    #[serde(skip)]
    pub connection: Option<SocketHandle>,
    pub profile: Option<RemoteUserProfile>,
    pub authentication: Option<Authentication>,
    pub host_settings: Option<HostSettings>,
}

impl RemoteServerState {
    pub fn is_authenticated(&self) -> bool {
        self.authentication
            .as_ref()
            .is_some_and(|auth| !auth.user_id.is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.authentication
            .as_ref()
            .map(|auth| auth.access_token.as_str())
    }

    pub fn api_host(&self) -> Option<&str> {
        self.host_settings.as_ref().map(|hosts| hosts.api.as_str())
    }

    pub fn find_friend(&self, username: &str) -> Option<&UserFriend> {
        self.profile
            .as_ref()?
            .friends
            .iter()
            .find(|friend| friend.username == username)
    }
}

fn arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

pub struct RemoteServerAgent;

impl RemoteServerAgent {
    fn change_server(state: &RemoteServerState, args: &[String]) -> AgentStep {
        let Some(api) = arg(args, 0) else {
            return unchanged(state, "Missing API host address");
        };
        let Some(socket) = arg(args, 1) else {
            return unchanged(state, "Missing socket host address");
        };

        info!(api, socket, "Remote server settings changed");
        let mut next = state.clone();
        next.host_settings = Some(HostSettings {
            api: api.to_string(),
            socket: socket.to_string(),
        });

        AgentStep::reply("Remote server settings updated", AgentState::RemoteServer(next))
    }

    fn connect(state: &RemoteServerState, args: &[String], ctx: &AgentContext) -> AgentStep {
        let Some(socket_host) = state
            .host_settings
            .as_ref()
            .map(|hosts| hosts.socket.as_str())
            .filter(|socket| !socket.is_empty())
        else {
            return unchanged(state, "Missing host settings for socket");
        };
        let Some(user_id) = arg(args, 0) else {
            return unchanged(state, "Missing user ID");
        };
        let Some(access_token) = arg(args, 1) else {
            return unchanged(state, "Missing access token");
        };
        let Some(refresh_token) = arg(args, 2) else {
            return unchanged(state, "Missing refresh token");
        };

        if let Some(previous) = &state.connection {
            debug!(url = previous.url(), "Replacing existing connection");
            previous.close();
        }

        let url = format!("{}/{}", socket_host.trim_end_matches('/'), access_token);
        let connection = ctx.sockets.connect(&url, REMOTE_SERVER, ctx.events.clone());

        let mut next = state.clone();
        next.connection = Some(connection);
        next.authentication = Some(Authentication {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            user_id: user_id.to_string(),
        });

        AgentStep::reply("Connecting to server...", AgentState::RemoteServer(next))
    }

    fn set_profile(state: &RemoteServerState, args: &[String]) -> AgentStep {
        let Some(raw) = arg(args, 0) else {
            return unchanged(state, "Missing profile");
        };
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return unchanged(state, "Profile could not be parsed");
        };
        let Ok(profile) = serde_json::from_value::<RemoteUserProfile>(value) else {
            return unchanged(state, "Profile is not valid");
        };

        let mut next = state.clone();
        next.profile = Some(profile);
        AgentStep::reply("Profile loaded successfully.", AgentState::RemoteServer(next))
    }

    fn set_friends_list(state: &RemoteServerState, args: &[String]) -> AgentStep {
        let Some(profile) = &state.profile else {
            return unchanged(state, "Profile is not loaded");
        };
        let Some(raw) = arg(args, 0) else {
            return unchanged(state, "Missing friends list");
        };
        let Ok(friends) = serde_json::from_str::<Vec<UserFriend>>(raw) else {
            return unchanged(state, "Friends list could not be parsed");
        };

        let message = if friends.is_empty() {
            "Updated friends list:\n\nNo friends.".to_string()
        } else {
            let lines: Vec<String> = friends
                .iter()
                .map(|friend| format!("- {}", friend.username))
                .collect();
            format!("Updated friends list:\n\n{}", lines.join("\n"))
        };

        let mut next = state.clone();
        next.profile = Some(RemoteUserProfile {
            friends,
            ..profile.clone()
        });
        AgentStep::reply(message, AgentState::RemoteServer(next))
    }

    fn add_friend(state: &RemoteServerState, args: &[String]) -> AgentStep {
        let Some(profile) = &state.profile else {
            return unchanged(state, "Profile is not loaded");
        };
        let Some(user_id) = arg(args, 0) else {
            return unchanged(state, "Missing user ID");
        };
        let Some(username) = arg(args, 1) else {
            return unchanged(state, "Missing username");
        };

        let mut profile = profile.clone();
        profile.friends.retain(|friend| friend.user_id != user_id);
        profile.friends.push(UserFriend {
            user_id: user_id.to_string(),
            username: username.to_string(),
        });

        let mut next = state.clone();
        next.profile = Some(profile);
        AgentStep::reply(
            format!("Added '{username}' as friend"),
            AgentState::RemoteServer(next),
        )
    }

    fn stop(state: &RemoteServerState) -> AgentStep {
        let mut next = state.clone();
        match next.connection.take() {
            Some(connection) => {
                connection.close();
                AgentStep::reply("Connection closed", AgentState::RemoteServer(next))
            }
            None => AgentStep::silent(AgentState::RemoteServer(next)),
        }
    }
}

fn unchanged(state: &RemoteServerState, message: &str) -> AgentStep {
    AgentStep::reply(message, AgentState::RemoteServer(state.clone()))
}

#[async_trait]
impl Agent for RemoteServerAgent {
    fn name(&self) -> &str {
        REMOTE_SERVER
    }

    fn description(&self) -> &str {
        "Chat server settings, session, and realtime connection"
    }

    async fn start(&self, _args: &[String], _ctx: &AgentContext) -> anyhow::Result<AgentStep> {
        Ok(AgentStep::reply(
            "Remote server agent started successfully",
            AgentState::RemoteServer(RemoteServerState::default()),
        ))
    }

    async fn handle(
        &self,
        state: &AgentState,
        command: &str,
        args: &[String],
        ctx: &AgentContext,
    ) -> anyhow::Result<AgentStep> {
        let state = expect_state!(state, RemoteServer);

        Ok(match command {
            "change-server" => Self::change_server(state, args),
            "connect" => Self::connect(state, args, ctx),
            "set-profile" => Self::set_profile(state, args),
            "set-friends-list" => Self::set_friends_list(state, args),
            "add-friend" => Self::add_friend(state, args),
            "stop" => Self::stop(state),
            _ => AgentStep::silent(AgentState::RemoteServer(state.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::agent_context;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn with_hosts() -> AgentState {
        AgentState::RemoteServer(RemoteServerState {
            host_settings: Some(HostSettings {
                api: "http://chat.local/api".into(),
                socket: "ws://chat.local/ws".into(),
            }),
            ..Default::default()
        })
    }

    fn with_profile() -> AgentState {
        AgentState::RemoteServer(RemoteServerState {
            profile: Some(RemoteUserProfile {
                user_id: "u1".into(),
                username: "alice".into(),
                friends: vec![],
            }),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_change_server() {
        let (ctx, _rx, _sockets) = agent_context();
        let state = AgentState::RemoteServer(RemoteServerState::default());

        let missing = RemoteServerAgent
            .handle(&state, "change-server", &args(&["http://a"]), &ctx)
            .await
            .unwrap();
        assert_eq!(missing.message.as_deref(), Some("Missing socket host address"));

        let step = RemoteServerAgent
            .handle(&state, "change-server", &args(&["http://a", "ws://b"]), &ctx)
            .await
            .unwrap();
        assert_eq!(step.message.as_deref(), Some("Remote server settings updated"));
        let hosts = step.state.as_remote_server().unwrap().host_settings.clone();
        assert_eq!(
            hosts,
            Some(HostSettings {
                api: "http://a".into(),
                socket: "ws://b".into()
            })
        );
    }

    #[tokio::test]
    async fn test_connect_requires_socket_host() {
        let (ctx, _rx, sockets) = agent_context();
        let state = AgentState::RemoteServer(RemoteServerState::default());

        let step = RemoteServerAgent
            .handle(&state, "connect", &args(&["u1", "a", "r"]), &ctx)
            .await
            .unwrap();

        assert_eq!(step.message.as_deref(), Some("Missing host settings for socket"));
        assert!(sockets.urls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_opens_token_url_and_replaces_previous() {
        let (ctx, _rx, sockets) = agent_context();

        let first = RemoteServerAgent
            .handle(&with_hosts(), "connect", &args(&["u1", "tok1", "ref1"]), &ctx)
            .await
            .unwrap();
        assert_eq!(first.message.as_deref(), Some("Connecting to server..."));
        let state = first.state.as_remote_server().unwrap();
        assert!(state.is_authenticated());
        assert_eq!(state.access_token(), Some("tok1"));

        let second = RemoteServerAgent
            .handle(&first.state, "connect", &args(&["u1", "tok2", "ref2"]), &ctx)
            .await
            .unwrap();

        assert_eq!(
            sockets.urls(),
            vec!["ws://chat.local/ws/tok1", "ws://chat.local/ws/tok2"]
        );
        assert_eq!(sockets.close_requests(0), 1);
        assert_eq!(sockets.close_requests(1), 0);
        assert_eq!(
            second
                .state
                .as_remote_server()
                .unwrap()
                .connection
                .as_ref()
                .map(|c| c.url().to_string()),
            Some("ws://chat.local/ws/tok2".to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_missing_tokens() {
        let (ctx, _rx, _sockets) = agent_context();
        for (input, expected) in [
            (args(&[]), "Missing user ID"),
            (args(&["u1"]), "Missing access token"),
            (args(&["u1", "a"]), "Missing refresh token"),
        ] {
            let step = RemoteServerAgent
                .handle(&with_hosts(), "connect", &input, &ctx)
                .await
                .unwrap();
            assert_eq!(step.message.as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_set_profile() {
        let (ctx, _rx, _sockets) = agent_context();
        let state = AgentState::RemoteServer(RemoteServerState::default());

        let bad_json = RemoteServerAgent
            .handle(&state, "set-profile", &args(&["{not json"]), &ctx)
            .await
            .unwrap();
        assert_eq!(bad_json.message.as_deref(), Some("Profile could not be parsed"));

        let bad_shape = RemoteServerAgent
            .handle(&state, "set-profile", &args(&[r#"{"id": 1}"#]), &ctx)
            .await
            .unwrap();
        assert_eq!(bad_shape.message.as_deref(), Some("Profile is not valid"));

        let raw = r#"{"id":"p","created_at":1,"user_id":"u1","username":"alice","friends":[{"user_id":"u2","username":"bob"}]}"#;
        let step = RemoteServerAgent
            .handle(&state, "set-profile", &args(&[raw]), &ctx)
            .await
            .unwrap();
        assert_eq!(step.message.as_deref(), Some("Profile loaded successfully."));
        let server = step.state.as_remote_server().unwrap();
        assert_eq!(server.find_friend("bob").map(|f| f.user_id.as_str()), Some("u2"));
    }

    #[tokio::test]
    async fn test_set_friends_list() {
        let (ctx, _rx, _sockets) = agent_context();

        let step = RemoteServerAgent
            .handle(
                &with_profile(),
                "set-friends-list",
                &args(&[r#"[{"user_id":"u2","username":"bob"},{"user_id":"u3","username":"carol"}]"#]),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            step.message.as_deref(),
            Some("Updated friends list:\n\n- bob\n- carol")
        );

        let empty = RemoteServerAgent
            .handle(&step.state, "set-friends-list", &args(&["[]"]), &ctx)
            .await
            .unwrap();
        assert_eq!(
            empty.message.as_deref(),
            Some("Updated friends list:\n\nNo friends.")
        );
    }

    #[tokio::test]
    async fn test_add_friend_replaces_same_id() {
        let (ctx, _rx, _sockets) = agent_context();

        let first = RemoteServerAgent
            .handle(&with_profile(), "add-friend", &args(&["u2", "bob"]), &ctx)
            .await
            .unwrap();
        assert_eq!(first.message.as_deref(), Some("Added 'bob' as friend"));

        let renamed = RemoteServerAgent
            .handle(&first.state, "add-friend", &args(&["u2", "robert"]), &ctx)
            .await
            .unwrap();
        let friends = &renamed
            .state
            .as_remote_server()
            .unwrap()
            .profile
            .as_ref()
            .unwrap()
            .friends;
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "robert");
    }

    #[tokio::test]
    async fn test_unknown_command_is_silent() {
        let (ctx, _rx, _sockets) = agent_context();
        let state = with_hosts();

        let step = RemoteServerAgent
            .handle(&state, "dance", &[], &ctx)
            .await
            .unwrap();
        assert!(step.message.is_none());
        assert_eq!(step.state, state);
    }

    #[tokio::test]
    async fn test_stop_closes_connection() {
        let (ctx, _rx, sockets) = agent_context();
        let connected = RemoteServerAgent
            .handle(&with_hosts(), "connect", &args(&["u1", "tok", "ref"]), &ctx)
            .await
            .unwrap();

        let stopped = RemoteServerAgent
            .handle(&connected.state, "stop", &[], &ctx)
            .await
            .unwrap();

        assert_eq!(sockets.close_requests(0), 1);
        assert!(stopped.state.as_remote_server().unwrap().connection.is_none());
    }
}
