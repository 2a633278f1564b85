//! Talk configuration
//!
//! Parsed from `~/.talk/config.toml`. A missing file yields defaults; a
//! malformed one is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    agents, DEFAULT_COMMAND_PREFIX, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_STEP_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkConfig {
    /// Escape that routes a line to the command engine in a standard conversation
    pub command_prefix: String,
    /// Show the welcome text in the root conversation
    pub show_intro: bool,
    /// Agents started when the controller is created
    pub autostart_agents: Vec<String>,
    /// Upper bound for a single program or agent step
    pub step_timeout_secs: u64,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Use https/wss when a server domain is given without a scheme
    pub secure: bool,
}

impl Default for TalkConfig {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            show_intro: true,
            autostart_agents: vec![
                agents::DISPLAY.to_string(),
                agents::USERS.to_string(),
                agents::REMOTE_SERVER.to_string(),
            ],
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            http: HttpConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl TalkConfig {
    /// Load configuration from a TOML file, falling back to defaults when absent
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: TalkConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::info!(path = %path.display(), "Loaded talk config");
        Ok(config)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    /// Scheme used for a bare server domain
    pub fn http_scheme(&self) -> &'static str {
        if self.server.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Scheme used for a bare socket host
    pub fn socket_scheme(&self) -> &'static str {
        if self.server.secure {
            "wss"
        } else {
            "ws"
        }
    }
}
