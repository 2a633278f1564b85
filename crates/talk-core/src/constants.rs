//! Shared constants

/// Directory under the home directory holding config and logs
pub const CONFIG_DIR_NAME: &str = ".talk";

/// Default escape that routes a line to the command engine in a standard conversation
pub const DEFAULT_COMMAND_PREFIX: &str = "\\c ";

/// Default per-step timeout for programs and agents (seconds)
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Agent escape keyword on the command line
pub const AGENT_CTL: &str = "agent-ctl";

/// Flag after which the remaining agent command text is passed through untouched
pub const JSON_FLAG: &str = "--json";

pub mod colors {
    pub const SELF_COLOR: &str = "lime";
    pub const SYSTEM_COLOR: &str = "#ff5050";
    pub const COMMAND_COLOR: &str = "#00cfff";
}

pub mod users {
    pub const SYSTEM_USER_ID: &str = "system";
    pub const SYSTEM_USERNAME: &str = "System";
    pub const LOCAL_USER_ID: &str = "local";
    pub const LOCAL_USERNAME: &str = "Anonymous";
}

pub mod agents {
    pub const DISPLAY: &str = "display";
    pub const USERS: &str = "users";
    pub const REMOTE_SERVER: &str = "remote-server";
}
