use serde::{Deserialize, Serialize};

/// Hosting platforms forgesync can back up from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    GitHub,
    GitLab,
    Bitbucket,
    Forgejo,
    #[serde(rename = "azure", alias = "msdevops")]
    AzureDevOps,
    Raw,
}

impl Platform {
    /// Default server domain when the config leaves it empty
    pub fn default_domain(&self) -> Option<&'static str> {
        match self {
            Platform::GitHub => Some("github.com"),
            Platform::GitLab => Some("gitlab.com"),
            Platform::Bitbucket => Some("bitbucket.org"),
            Platform::Forgejo => Some("v9.next.forgejo.org"),
            Platform::AzureDevOps => Some("dev.azure.com"),
            Platform::Raw => None,
        }
    }

    /// Bitbucket serves wikis as `<repo>.git/wiki`; everyone else as `<repo>.wiki.git`
    pub fn wiki_suffix(&self) -> &'static str {
        match self {
            Platform::Bitbucket => ".git/wiki",
            _ => ".wiki.git",
        }
    }

    /// Whether discovery needs a username and token
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Platform::Raw)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::GitHub => write!(f, "github"),
            Platform::GitLab => write!(f, "gitlab"),
            Platform::Bitbucket => write!(f, "bitbucket"),
            Platform::Forgejo => write!(f, "forgejo"),
            Platform::AzureDevOps => write!(f, "azure"),
            Platform::Raw => write!(f, "raw"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Platform::GitHub),
            "gitlab" => Ok(Platform::GitLab),
            "bitbucket" => Ok(Platform::Bitbucket),
            "forgejo" => Ok(Platform::Forgejo),
            "azure" | "msdevops" => Ok(Platform::AzureDevOps),
            "raw" => Ok(Platform::Raw),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}
