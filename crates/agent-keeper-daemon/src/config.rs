//! Keeper configuration.
//!
//! [`KeeperConfig`] resolves the on-disk layout and detection defaults from
//! the environment. [`UserConfig`] is the user-editable settings file; it
//! loads self-healingly so a corrupt config can never take the monitor down.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_COMMAND_PATTERN: &str = "claude";
const STATE_DIR_NAME: &str = ".agent-keeper";
const PID_FILE_NAME: &str = "processes.json";
const USER_CONFIG_FILE_NAME: &str = "config.json";
const CACHE_DIR_NAME: &str = "cache";

#[derive(Debug, Clone)]
pub struct KeeperConfig {
    pub state_dir: PathBuf,
    pub command_pattern: String,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl KeeperConfig {
    pub fn from_env() -> Self {
        Self {
            state_dir: env::var("AGENT_KEEPER_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_state_dir()),
            command_pattern: env::var("AGENT_KEEPER_COMMAND_PATTERN")
                .unwrap_or_else(|_| DEFAULT_COMMAND_PATTERN.to_string()),
        }
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_command_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.command_pattern = pattern.into();
        self
    }

    /// Path of the durable PID-tracking file.
    pub fn pid_file_path(&self) -> PathBuf {
        self.state_dir.join(PID_FILE_NAME)
    }

    /// Path of the user settings file.
    pub fn user_config_path(&self) -> PathBuf {
        self.state_dir.join(USER_CONFIG_FILE_NAME)
    }

    /// Directory holding the generic cache files, one JSON file per store.
    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir.join(CACHE_DIR_NAME)
    }

    pub fn cache_file_path(&self, name: &str) -> PathBuf {
        self.cache_dir().join(format!("{name}.json"))
    }
}

fn default_state_dir() -> PathBuf {
    let home = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    home.join(STATE_DIR_NAME)
}

/// User-editable settings. Unknown fields are ignored and missing fields
/// take their defaults, so older and newer config files both load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserConfig {
    pub auto_resume_on_rate_limit: bool,
}

impl UserConfig {
    /// Load from `path`. A missing, unreadable, or unparsable file yields
    /// the defaults; this is never an error.
    pub async fn load(path: &Path) -> UserConfig {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => return UserConfig::default(),
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "User config unparsable, falling back to defaults"
                );
                UserConfig::default()
            }
        }
    }
}

/// Read access to the effective user configuration.
///
/// The monitor re-reads this on every event so edits to the settings file
/// take effect without a restart.
#[async_trait]
pub trait UserConfigSource: Send + Sync {
    async fn user_config(&self) -> UserConfig;
}

pub struct FileUserConfigSource {
    path: PathBuf,
}

impl FileUserConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UserConfigSource for FileUserConfigSource {
    async fn user_config(&self) -> UserConfig {
        UserConfig::load(&self.path).await
    }
}
