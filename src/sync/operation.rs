//! Clone-or-update of a single repository and its wiki
//!
//! ```text
//! NotPresent -> Cloning  -> Done
//! Present    -> Fetching -> Done
//!           (either)     -> Failed
//! ```
//!
//! Failures are recorded in [`SyncStats`] and never returned, so one broken
//! repository cannot stop its siblings.

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::retry::{retry, RetryError, RetryPolicy};
use super::stats::SyncStats;
use crate::config::Config;
use crate::git::{GitCommand, GitError, GitExecutor, GitOutput};
use crate::token::TokenRotator;
use crate::types::{CloneType, Platform, RemoteSource, RepositoryDescriptor};

/// What an outcome is counted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncCategory {
    Repo,
    Wiki,
    Issues,
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncCategory::Repo => write!(f, "repo"),
            SyncCategory::Wiki => write!(f, "wiki"),
            SyncCategory::Issues => write!(f, "issues"),
        }
    }
}

/// Result of one repo, wiki or issues operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub category: SyncCategory,
    /// Full name of the repository
    pub id: String,
    /// Present iff the operation failed
    pub error: Option<String>,
    /// Nothing to sync (a wiki that was never created); counted neither way
    pub benign: bool,
}

impl SyncOutcome {
    pub fn success(category: SyncCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
            error: None,
            benign: false,
        }
    }

    pub fn failure(category: SyncCategory, id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            category,
            id: id.into(),
            error: Some(error.to_string()),
            benign: false,
        }
    }

    pub fn benign(category: SyncCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
            error: None,
            benign: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.benign
    }
}

/// Which of a repository's two git remotes to work on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Repo,
    Wiki,
}

/// Settings every operation in a session shares
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub backup_dir: PathBuf,
    pub clone_type: CloneType,
    pub retry: RetryPolicy,
    pub platform: Platform,
    pub username: String,
    pub protocol: String,
    pub domain: String,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backup_dir: config.backup_dir.clone(),
            clone_type: config.clone_type(),
            retry: config.retry_policy(),
            platform: config.platform,
            username: config.username.clone(),
            protocol: config.server.protocol.clone(),
            domain: config.server.domain.clone(),
        }
    }
}

/// Runs the clone-or-update state machine for repositories and wikis
pub struct RepoSyncer {
    settings: SyncSettings,
    git: Arc<dyn GitExecutor>,
    tokens: Arc<TokenRotator>,
    stats: Arc<SyncStats>,
}

impl RepoSyncer {
    pub fn new(
        settings: SyncSettings,
        git: Arc<dyn GitExecutor>,
        tokens: Arc<TokenRotator>,
        stats: Arc<SyncStats>,
    ) -> Self {
        Self {
            settings,
            git,
            tokens,
            stats,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// `<backup>/<owner>/<name>`, the directory holding everything for one repository
    pub fn repo_dir(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.settings.backup_dir.join(&repo.owner).join(&repo.name)
    }

    /// Local git directory for the repository itself
    pub fn repo_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.local_path(repo, Target::Repo)
    }

    /// Local git directory for the repository's wiki
    pub fn wiki_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.local_path(repo, Target::Wiki)
    }

    fn local_path(&self, repo: &RepositoryDescriptor, target: Target) -> PathBuf {
        let stem = match target {
            Target::Repo => repo.name.clone(),
            Target::Wiki => format!("{}.wiki", repo.name),
        };
        let dir_name = if self.settings.clone_type.is_bare() {
            format!("{}.git", stem)
        } else {
            stem
        };
        self.repo_dir(repo).join(dir_name)
    }

    /// Remote URL for `repo`, authenticated with the next token in rotation
    pub fn remote_url(&self, repo: &RepositoryDescriptor) -> String {
        self.url_for(repo, Target::Repo)
    }

    /// Remote URL for the wiki of `repo`
    pub fn wiki_url(&self, repo: &RepositoryDescriptor) -> String {
        self.url_for(repo, Target::Wiki)
    }

    fn url_for(&self, repo: &RepositoryDescriptor, target: Target) -> String {
        let suffix = match target {
            Target::Repo => ".git",
            Target::Wiki => self.settings.platform.wiki_suffix(),
        };

        match &repo.source {
            RemoteSource::Server => {
                let s = &self.settings;
                let token = self.tokens.next();
                let userinfo = if token.is_empty() {
                    String::new()
                } else {
                    format!(
                        "{}:{}@",
                        urlencoding::encode(&s.username),
                        urlencoding::encode(&token)
                    )
                };
                format!(
                    "{}://{}{}/{}/{}{}",
                    s.protocol, userinfo, s.domain, repo.owner, repo.name, suffix
                )
            }
            RemoteSource::Url { url, authenticate } => {
                let url = match target {
                    Target::Repo => url.clone(),
                    Target::Wiki => format!("{}{}", strip_git_suffix(url), suffix),
                };
                if *authenticate {
                    inject_token(&url, &self.tokens.next())
                } else {
                    url
                }
            }
        }
    }

    /// Clone or update the repository and record the outcome
    pub async fn sync_repo(&self, repo: &RepositoryDescriptor) -> SyncOutcome {
        let id = repo.full_name();
        let outcome = match self.clone_or_update(repo, Target::Repo).await {
            Ok(()) => {
                tracing::info!("Synced {}", id);
                SyncOutcome::success(SyncCategory::Repo, id)
            }
            Err(e) => {
                tracing::error!("Failed to sync {}: {}", id, e);
                SyncOutcome::failure(SyncCategory::Repo, id, e)
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    /// Clone or update the wiki and record the outcome.
    ///
    /// A wiki the platform reports as missing is benign: logged, not counted.
    pub async fn sync_wiki(&self, repo: &RepositoryDescriptor) -> SyncOutcome {
        let id = format!("{}.wiki", repo.full_name());
        let outcome = match self.clone_or_update(repo, Target::Wiki).await {
            Ok(()) => {
                tracing::info!("Synced {}", id);
                SyncOutcome::success(SyncCategory::Wiki, id)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("No wiki content for {}, skipping", repo.full_name());
                SyncOutcome::benign(SyncCategory::Wiki, id)
            }
            Err(e) => {
                tracing::error!("Failed to sync {}: {}", id, e);
                SyncOutcome::failure(SyncCategory::Wiki, id, e)
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    async fn clone_or_update(
        &self,
        repo: &RepositoryDescriptor,
        target: Target,
    ) -> Result<(), OperationError> {
        let path = self.local_path(repo, target);
        let repo_dir = self.repo_dir(repo);
        tokio::fs::create_dir_all(&repo_dir).await.map_err(|e| {
            OperationError::Storage(format!("cannot create {}: {}", repo_dir.display(), e))
        })?;

        let present = is_present(&path).await;
        let action = if present { "update" } else { "clone" };
        let label = match target {
            Target::Repo => format!("{} {}", action, repo.full_name()),
            Target::Wiki => format!("{} {} wiki", action, repo.full_name()),
        };

        let clone_type = self.settings.clone_type;
        let output = retry(self.settings.retry, &label, move || {
            // fresh token on every attempt
            let url = self.url_for(repo, target);
            let command = if present {
                GitCommand::update_repo(clone_type, &url, &path)
            } else {
                GitCommand::clone_repo(clone_type, &url, &path)
            };
            self.run(command)
        })
        .await
        .map_err(OperationError::Git)?;

        if !output.output.trim().is_empty() {
            tracing::debug!("{}: {}", label, output.output.trim());
        }
        Ok(())
    }

    async fn run(&self, command: GitCommand) -> Result<GitOutput, GitError> {
        let result = self.git.execute(&command).await;
        if let Err(e) = &result {
            if let Some(output) = e.output() {
                tracing::debug!("{} failed: {}", command.display_redacted(), output.trim());
            }
        }
        result
    }
}

impl fmt::Debug for RepoSyncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoSyncer")
            .field("settings", &self.settings)
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

/// Why a clone-or-update did not complete
#[derive(Debug, thiserror::Error)]
enum OperationError {
    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Git(RetryError<GitError>),
}

impl OperationError {
    fn is_not_found(&self) -> bool {
        match self {
            OperationError::Git(e) => not_found_pattern().is_match(&e.last_error().to_string()),
            OperationError::Storage(_) => false,
        }
    }
}

fn not_found_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)not found|does not exist").expect("static regex"))
}

fn strip_git_suffix(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

/// `https://host/path` → `https://<token>@host/path`
fn inject_token(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{}://{}@{}", scheme, urlencoding::encode(token), rest),
        None => url.to_string(),
    }
}

/// Whether `path` is an existing local copy
async fn is_present(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
