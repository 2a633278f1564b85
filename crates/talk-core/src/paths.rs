//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

use crate::constants::CONFIG_DIR_NAME;

/// Get the talk config directory (~/.talk)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.talk/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the config file (~/.talk/config.toml)
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_nest_under_config_dir() {
        let root = config_dir();
        assert!(root.ends_with(CONFIG_DIR_NAME));
        assert!(logs_dir().starts_with(&root));
        assert_eq!(config_path().file_name().unwrap(), "config.toml");
    }
}
