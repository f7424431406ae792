//! GitLab (gitlab.com or self-hosted) via the REST API v4

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

use super::{server_url, to_issue_error, ApiAuth, ApiClient, PlatformClient, PlatformResult};
use crate::config::Config;
use crate::filter::{Candidate, RepoFilter};
use crate::issues::{Issue, IssueComment, IssueResult, IssueSource, IssueUser};
use crate::types::{Platform, RepositoryDescriptor};

const PER_PAGE: &str = "100";

pub(crate) fn api_base(config: &Config) -> String {
    format!("{}/api/v4", server_url(config))
}

/// Page number from GitLab's `X-Next-Page` header (empty on the last page)
fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Deserialize)]
struct Namespace {
    full_path: String,
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    path: String,
    namespace: Namespace,
    #[serde(default)]
    forked_from_project: Option<serde_json::Value>,
    #[serde(default)]
    wiki_enabled: bool,
    #[serde(default)]
    issues_enabled: bool,
}

/// Lists projects the token's user is a member of
#[derive(Debug, Clone)]
pub struct GitLabClient {
    api: ApiClient,
    filter: RepoFilter,
    api_url: String,
}

impl GitLabClient {
    pub(crate) fn new(api: ApiClient, filter: RepoFilter, api_url: String) -> Self {
        Self {
            api,
            filter,
            api_url,
        }
    }
}

#[async_trait]
impl PlatformClient for GitLabClient {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }

    async fn discover(&self, _config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        let url = format!("{}/projects", self.api_url);
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [
                ("membership", "true".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let (batch, headers): (Vec<Project>, _) =
                self.api.get_json(&url, &query, &ApiAuth::PrivateToken).await?;

            for project in batch {
                let candidate = Candidate {
                    name: &project.path,
                    owner: &project.namespace.full_path,
                    owner_is_org: project.namespace.kind == "group",
                    fork: project.forked_from_project.is_some(),
                };
                if self.filter.allows(&candidate) {
                    repos.push(
                        RepositoryDescriptor::new(project.namespace.full_path, project.path)
                            .with_wiki(project.wiki_enabled)
                            .with_issues(project.issues_enabled)
                            .with_platform_id(project.id.to_string()),
                    );
                }
            }

            match next_page(&headers) {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(repos)
    }

    fn issue_source(&self) -> Option<Arc<dyn IssueSource>> {
        Some(Arc::new(GitLabIssues {
            api: self.api.clone(),
            api_url: self.api_url.clone(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
    #[serde(default)]
    web_url: String,
}

impl From<GitLabUser> for IssueUser {
    fn from(user: GitLabUser) -> Self {
        IssueUser {
            login: user.username,
            url: user.web_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitLabMilestone {
    title: String,
}

#[derive(Debug, Deserialize)]
struct GitLabIssue {
    iid: u64,
    title: String,
    description: Option<String>,
    state: String,
    author: GitLabUser,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    assignees: Vec<GitLabUser>,
    milestone: Option<GitLabMilestone>,
    #[serde(default)]
    web_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitLabNote {
    id: i64,
    body: String,
    author: GitLabUser,
    #[serde(default)]
    system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Issues and their (non-system) notes from the GitLab API
#[derive(Debug, Clone)]
pub struct GitLabIssues {
    api: ApiClient,
    api_url: String,
}

impl GitLabIssues {
    /// Numeric project id when discovery provided one, else the URL-encoded path
    fn project_ref(repo: &RepositoryDescriptor) -> String {
        repo.platform_id
            .clone()
            .unwrap_or_else(|| urlencoding::encode(&repo.full_name()).into_owned())
    }

    async fn notes(&self, project: &str, iid: u64) -> IssueResult<Vec<IssueComment>> {
        let url = format!("{}/projects/{}/issues/{}/notes", self.api_url, project, iid);
        let mut comments = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let (batch, headers): (Vec<GitLabNote>, _) = self
                .api
                .get_json(&url, &query, &ApiAuth::PrivateToken)
                .await
                .map_err(to_issue_error)?;

            comments.extend(batch.into_iter().filter(|n| !n.system).map(|n| IssueComment {
                id: n.id,
                body: n.body,
                author: n.author.into(),
                url: String::new(),
                created_at: n.created_at,
                updated_at: n.updated_at,
            }));

            match next_page(&headers) {
                Some(next) => page = next,
                None => return Ok(comments),
            }
        }
    }
}

#[async_trait]
impl IssueSource for GitLabIssues {
    async fn fetch_issues(
        &self,
        repo: &RepositoryDescriptor,
        since: Option<DateTime<Utc>>,
    ) -> IssueResult<Vec<Issue>> {
        let project = Self::project_ref(repo);
        let url = format!("{}/projects/{}/issues", self.api_url, project);
        let mut issues = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("state", "all".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(since) = since {
                query.push(("updated_after", since.to_rfc3339()));
            }

            let (batch, headers): (Vec<GitLabIssue>, _) = self
                .api
                .get_json(&url, &query, &ApiAuth::PrivateToken)
                .await
                .map_err(to_issue_error)?;

            for gl in batch {
                let comments = match self.notes(&project, gl.iid).await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!("Failed to fetch notes for issue #{}: {}", gl.iid, e);
                        Vec::new()
                    }
                };

                issues.push(Issue {
                    number: gl.iid,
                    title: gl.title,
                    body: gl.description.unwrap_or_default(),
                    state: gl.state,
                    author: gl.author.into(),
                    labels: gl.labels,
                    assignees: gl.assignees.into_iter().map(Into::into).collect(),
                    milestone: gl.milestone.map(|m| m.title).unwrap_or_default(),
                    url: gl.web_url,
                    created_at: gl.created_at,
                    updated_at: gl.updated_at,
                    closed_at: gl.closed_at,
                    comments,
                });
            }

            match next_page(&headers) {
                Some(next) => page = next,
                None => break,
            }
        }

        tracing::debug!("Fetched {} issues for {}", issues.len(), repo.full_name());
        Ok(issues)
    }
}
