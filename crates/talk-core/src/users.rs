//! Users known to the client

use serde::{Deserialize, Serialize};

use crate::constants::{colors, users};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub color: String,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            color: color.into(),
        }
    }

    /// Author of command echoes, program output, and agent notices
    pub fn system() -> Self {
        Self::new(
            users::SYSTEM_USER_ID,
            users::SYSTEM_USERNAME,
            colors::SYSTEM_COLOR,
        )
    }

    /// The unauthenticated person at the keyboard
    pub fn local() -> Self {
        Self::new(users::LOCAL_USER_ID, users::LOCAL_USERNAME, colors::SELF_COLOR)
    }
}

/// Welcome text shown in the root conversation and by `intro`
pub fn intro_text(command_prefix: &str) -> String {
    format!(
        "Welcome to Talk.

Here is a list of commands that you may find useful.
If you are in a chat with another user, these commands can be run by prepending the command with the command flag '{prefix}[command]'.

* 'clear' clears the current conversation on screen
* 'intro' displays this text
* 'commands' lists every available command
* 'epoch' generates a millisecond timestamp epoch
* 'date-fmt [format]' displays the current date time in a given format (strftime style)
* 'pretty-json [json]' pretty prints a string of JSON
* 'uuid [count]' generates the specified number of V4 UUID's
* 'set-clr [color]' changes your display color.
* 'set-sys-clr [color]' changes the system display color.
* 'set-cmd-clr [color]' changes the command display color.
* 'set-svr [domain]' connects to a chat server
* 'register', 'login' create and sign in to an account on the server
* 'add-friend [username]', 'chat [username]' manage friends and open chats
* 'agent-ctl [agent] [start|stop|command]' controls background agents",
        prefix = command_prefix
    )
}
