//! Users agent - the directory of users messages can be attributed to

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::agent::{expect_state, Agent, AgentContext, AgentState, AgentStep};
use crate::colors::is_valid_color;
use crate::constants::agents::USERS;
use crate::users::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsersState {
    pub users: BTreeMap<String, User>,
}

impl Default for UsersState {
    fn default() -> Self {
        let users = [User::system(), User::local()]
            .into_iter()
            .map(|user| (user.user_id.clone(), user))
            .collect();
        Self { users }
    }
}

impl UsersState {
    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }
}

pub struct UsersAgent;

impl UsersAgent {
    fn add_user(state: &UsersState, args: &[String]) -> AgentStep {
        let unchanged = |message: &str| AgentStep::reply(message, AgentState::Users(state.clone()));

        let mut args = args.iter().map(String::as_str);
        let Some(user_id) = args.next().filter(|s| !s.is_empty()) else {
            return unchanged("Missing user ID");
        };
        let Some(username) = args.next().filter(|s| !s.is_empty()) else {
            return unchanged("Missing username");
        };
        let Some(color) = args.next().filter(|s| !s.is_empty()) else {
            return unchanged("Missing user display color");
        };
        if !is_valid_color(color) {
            return unchanged(&format!(
                "Unable to add user. '{color}' is not a recognized color"
            ));
        }

        if state.users.contains_key(user_id) {
            return unchanged(&format!("User [{username}] exists in the users list"));
        }

        let mut next = state.clone();
        next.users
            .insert(user_id.to_string(), User::new(user_id, username, color));

        AgentStep::reply(
            format!("User [{username}] added to user list."),
            AgentState::Users(next),
        )
    }
}

#[async_trait]
impl Agent for UsersAgent {
    fn name(&self) -> &str {
        USERS
    }

    fn description(&self) -> &str {
        "Known users and their display colours"
    }

    async fn start(&self, _args: &[String], _ctx: &AgentContext) -> anyhow::Result<AgentStep> {
        Ok(AgentStep::reply(
            "Users agent started successfully",
            AgentState::Users(UsersState::default()),
        ))
    }

    async fn handle(
        &self,
        state: &AgentState,
        command: &str,
        args: &[String],
        _ctx: &AgentContext,
    ) -> anyhow::Result<AgentStep> {
        let state = expect_state!(state, Users);

        Ok(match command {
            "add-user" => Self::add_user(state, args),
            "stop" => AgentStep::silent(AgentState::Users(state.clone())),
            other => AgentStep::reply(
                super::unknown_command(other),
                AgentState::Users(state.clone()),
            ),
        })
    }
}
