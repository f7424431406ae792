use thiserror::Error;

use crate::config::ConfigError;
use crate::platform::PlatformError;

/// Errors that abort a whole backup session.
///
/// Per-repository failures never surface here; they are recorded in the
/// session's stats instead.
#[derive(Debug, Error)]
pub enum ForgesyncError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, ForgesyncError>;
