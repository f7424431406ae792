//! Core types for forgesync

pub mod platform;
pub mod repo;

use serde::{Deserialize, Serialize};

pub use platform::Platform;
pub use repo::{RemoteSource, RepositoryDescriptor};

/// How a repository is materialized on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneType {
    /// `git clone --bare` (default)
    #[default]
    Bare,
    /// Regular clone with a working tree
    Full,
    /// `git clone --mirror`
    Mirror,
    /// `git clone --depth 1`
    Shallow,
}

impl CloneType {
    /// Whether the local copy is a bare git directory (no working tree)
    pub fn is_bare(self) -> bool {
        matches!(self, CloneType::Bare | CloneType::Mirror)
    }
}

impl std::fmt::Display for CloneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloneType::Bare => write!(f, "bare"),
            CloneType::Full => write!(f, "full"),
            CloneType::Mirror => write!(f, "mirror"),
            CloneType::Shallow => write!(f, "shallow"),
        }
    }
}

impl std::str::FromStr for CloneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bare" => Ok(CloneType::Bare),
            "full" => Ok(CloneType::Full),
            "mirror" => Ok(CloneType::Mirror),
            "shallow" => Ok(CloneType::Shallow),
            _ => Err(format!("Unknown clone type: {}", s)),
        }
    }
}
