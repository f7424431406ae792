//! Configuration for forgesync
//!
//! The on-disk format is YAML (`~/.config/forgesync/config.yaml` by default).
//! Loading is a three step affair: [`Config::load`] parses the file,
//! [`Config::apply_defaults`] fills in platform defaults and migrates
//! deprecated fields, and [`Config::validate`] rejects anything the sync
//! engine cannot work with.

mod defaults;
mod paths;
mod validate;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sync::RetryPolicy;
use crate::types::{CloneType, Platform};

pub use paths::{expand_tilde, ForgesyncPaths, BACKUP_DIR_ENV, CONFIG_FILE_ENV};

/// Smallest and largest accepted `concurrency` values
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 20;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Git server the platform lives on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub protocol: String,
}

/// Retry settings for git operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts; zero or negative means a single attempt
    #[serde(default)]
    pub count: i32,
    /// Seconds to wait between attempts
    #[serde(default)]
    pub delay: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.count, Duration::from_secs(self.delay))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtfyConfig {
    #[serde(default)]
    pub topic: String,
    /// Defaults to `https://ntfy.sh`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// 1-5, defaults to 3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// The `forgesync` tag is always added
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotifyConfig {
    pub url: String,
    pub app_token: String,
    /// 1-5, defaults to 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only notify when something failed
    #[serde(default = "default_true")]
    pub only_failures: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntfy: Option<NtfyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gotify: Option<GotifyConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            only_failures: true,
            ntfy: None,
            gotify: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Root config.yaml structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub username: String,

    /// Deprecated single token, merged into `tokens` by `apply_defaults`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default)]
    pub tokens: Vec<String>,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub include_repos: Vec<String>,
    #[serde(default)]
    pub exclude_repos: Vec<String>,
    #[serde(default)]
    pub include_orgs: Vec<String>,
    #[serde(default)]
    pub exclude_orgs: Vec<String>,

    #[serde(default)]
    pub include_forks: bool,
    #[serde(default)]
    pub include_wiki: bool,
    #[serde(default)]
    pub include_issues: bool,

    #[serde(default)]
    pub backup_dir: PathBuf,

    /// Bitbucket workspace or Azure DevOps project
    #[serde(default)]
    pub workspace: String,

    /// Left unset in older files; `apply_defaults` fills in `bare`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_type: Option<CloneType>,

    #[serde(default)]
    pub raw_git_urls: Vec<String>,

    #[serde(default)]
    pub concurrency: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Starter config written by `forgesync --init`
    pub fn initial(backup_dir: PathBuf) -> Self {
        Self {
            platform: Platform::GitHub,
            server: ServerConfig {
                domain: "github.com".to_string(),
                protocol: "https".to_string(),
            },
            include_wiki: true,
            backup_dir,
            clone_type: Some(CloneType::Bare),
            concurrency: 5,
            retry: RetryConfig { count: 3, delay: 5 },
            notification: NotificationConfig {
                ntfy: Some(NtfyConfig {
                    priority: Some(3),
                    tags: vec!["forgesync".to_string()],
                    ..NtfyConfig::default()
                }),
                ..NotificationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load config from a YAML file
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> ConfigResult<Self> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.backup_dir = expand_tilde(&config.backup_dir);
        Ok(config)
    }

    /// Save config to a YAML file, creating parent directories
    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_yaml::to_string(self)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Clone type with the `bare` fallback applied
    pub fn clone_type(&self) -> CloneType {
        self.clone_type.unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}
