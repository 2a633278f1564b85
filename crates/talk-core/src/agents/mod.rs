//! Built-in agents

pub mod display;
pub mod remote_server;
pub mod users;

use std::sync::Arc;

use crate::agent::Agent;

pub use display::{DisplayAgent, DisplayState};
pub use remote_server::{
    Authentication, HostSettings, RemoteServerAgent, RemoteServerState, RemoteUserProfile,
    UserFriend,
};
pub use users::{UsersAgent, UsersState};

/// Every agent the controller registers at construction
pub fn builtin() -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(DisplayAgent),
        Arc::new(UsersAgent),
        Arc::new(RemoteServerAgent),
    ]
}

/// Reply used by agents that reject an unknown command
pub(crate) fn unknown_command(command: &str) -> String {
    format!("Command '{command}' is unknown. No action was performed")
}
