//! Issue backup
//!
//! An [`IssueSource`] fetches issues from a platform API; [`IssueArchive`]
//! stores them under `<backup>/<owner>/<name>/issues/`. [`IssueArchiver`]
//! glues the two together for the sync session and only fetches what changed
//! since the newest stored issue.

mod archive;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::sync::IssueSync;
use crate::types::RepositoryDescriptor;

pub use archive::IssueArchive;

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type IssueResult<T> = Result<T, IssueError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUser {
    pub login: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: i64,
    pub body: String,
    pub author: IssueUser,
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    pub author: IssueUser,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<IssueUser>,
    #[serde(default)]
    pub milestone: String,
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<IssueComment>,
}

/// One row of `issues/index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Issue> for IndexEntry {
    fn from(issue: &Issue) -> Self {
        Self {
            number: issue.number,
            title: issue.title.clone(),
            state: issue.state.clone(),
            updated_at: issue.updated_at,
        }
    }
}

/// Fetches issues (with comments) from a platform
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Issues updated after `since`, or all of them when `since` is `None`.
    /// Pull/merge requests are not issues and are left out.
    async fn fetch_issues(
        &self,
        repo: &RepositoryDescriptor,
        since: Option<DateTime<Utc>>,
    ) -> IssueResult<Vec<Issue>>;
}

/// Incremental issue backup for the sync session
pub struct IssueArchiver {
    source: Arc<dyn IssueSource>,
    archive: IssueArchive,
}

impl IssueArchiver {
    pub fn new(source: Arc<dyn IssueSource>, archive: IssueArchive) -> Self {
        Self { source, archive }
    }
}

impl std::fmt::Debug for IssueArchiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueArchiver")
            .field("archive", &self.archive)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IssueSync for IssueArchiver {
    async fn sync_issues(&self, repo: &RepositoryDescriptor) -> IssueResult<usize> {
        let since = self.archive.last_sync_time(&repo.owner, &repo.name).await;
        match since {
            Some(t) => tracing::debug!("Fetching issues for {} updated since {}", repo.full_name(), t),
            None => tracing::debug!("Fetching all issues for {}", repo.full_name()),
        }

        let issues = self.source.fetch_issues(repo, since).await?;
        if issues.is_empty() {
            return Ok(0);
        }

        self.archive.write(&repo.owner, &repo.name, &issues).await?;
        Ok(issues.len())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{at, issue};
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<Option<DateTime<Utc>>>>,
        issues: Vec<Issue>,
    }

    #[async_trait]
    impl IssueSource for FakeSource {
        async fn fetch_issues(
            &self,
            _repo: &RepositoryDescriptor,
            since: Option<DateTime<Utc>>,
        ) -> IssueResult<Vec<Issue>> {
            self.calls.lock().unwrap().push(since);
            Ok(self.issues.clone())
        }
    }

    #[tokio::test]
    async fn test_archiver_is_incremental() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(FakeSource {
            issues: vec![issue(1, 5), issue(2, 7)],
            ..FakeSource::default()
        });
        let archiver = IssueArchiver::new(source.clone(), IssueArchive::new(dir.path()));
        let repo = RepositoryDescriptor::new("acme", "api");

        assert_eq!(archiver.sync_issues(&repo).await.unwrap(), 2);
        assert_eq!(archiver.sync_issues(&repo).await.unwrap(), 2);

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[None, Some(at(7))]);
    }

    #[tokio::test]
    async fn test_no_issues_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let archiver = IssueArchiver::new(Arc::new(FakeSource::default()), IssueArchive::new(dir.path()));

        let written = archiver
            .sync_issues(&RepositoryDescriptor::new("acme", "api"))
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert!(!dir.path().join("acme/api/issues").exists());
    }
}
