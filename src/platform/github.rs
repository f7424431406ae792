//! GitHub (and GitHub Enterprise) via the REST API v3

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{server_url, to_issue_error, ApiAuth, ApiClient, PlatformClient, PlatformResult};
use crate::config::Config;
use crate::filter::{Candidate, RepoFilter};
use crate::issues::{Issue, IssueComment, IssueResult, IssueSource, IssueUser};
use crate::types::{Platform, RepositoryDescriptor};

const GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: &str = "100";

/// `api.github.com` for github.com, `<server>/api/v3` for Enterprise
pub(crate) fn api_base(config: &Config) -> String {
    if config.server.domain == "github.com" {
        GITHUB_API_URL.to_string()
    } else {
        format!("{}/api/v3", server_url(config))
    }
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubOwner,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    has_issues: bool,
}

/// Lists repositories of the authenticated user
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: ApiClient,
    filter: RepoFilter,
    api_url: String,
}

impl GitHubClient {
    pub(crate) fn new(api: ApiClient, filter: RepoFilter, api_url: String) -> Self {
        Self {
            api,
            filter,
            api_url,
        }
    }
}

#[async_trait]
impl PlatformClient for GitHubClient {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    async fn discover(&self, _config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        let url = format!("{}/user/repos", self.api_url);
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let (batch, headers): (Vec<GitHubRepo>, _) =
                self.api.get_json(&url, &query, &ApiAuth::Bearer).await?;

            for repo in batch {
                let candidate = Candidate {
                    name: &repo.name,
                    owner: &repo.owner.login,
                    owner_is_org: repo.owner.kind == "Organization",
                    fork: repo.fork,
                };
                if self.filter.allows(&candidate) {
                    repos.push(
                        RepositoryDescriptor::new(repo.owner.login, repo.name)
                            .with_wiki(repo.has_wiki)
                            .with_issues(repo.has_issues),
                    );
                }
            }

            if !has_next_page(&headers) {
                break;
            }
            page += 1;
            tracing::debug!("Fetching next page: {}", page);
        }

        Ok(repos)
    }

    fn issue_source(&self) -> Option<Arc<dyn IssueSource>> {
        Some(Arc::new(GitHubIssues {
            api: self.api.clone(),
            api_url: self.api_url.clone(),
        }))
    }
}

/// Whether GitHub's `Link` header advertises a `rel="next"` page
pub(crate) fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get("link")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|link| link.split(',').any(|part| part.contains("rel=\"next\"")))
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    #[serde(default)]
    html_url: String,
}

impl From<GitHubUser> for IssueUser {
    fn from(user: GitHubUser) -> Self {
        IssueUser {
            login: user.login,
            url: user.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubMilestone {
    title: String,
}

#[derive(Debug, Deserialize)]
struct GitHubIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: GitHubUser,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    #[serde(default)]
    assignees: Vec<GitHubUser>,
    milestone: Option<GitHubMilestone>,
    #[serde(default)]
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    comments: u64,
    /// Present on pull requests, which the issues endpoint also returns
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: i64,
    body: Option<String>,
    user: GitHubUser,
    #[serde(default)]
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// API URL of the owning issue, ending in its number
    #[serde(default)]
    issue_url: String,
}

impl From<GitHubComment> for IssueComment {
    fn from(c: GitHubComment) -> Self {
        IssueComment {
            id: c.id,
            body: c.body.unwrap_or_default(),
            author: c.user.into(),
            url: c.html_url,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

fn issue_number(issue_url: &str) -> Option<u64> {
    issue_url.rsplit('/').next()?.parse().ok()
}

/// Issues and their comments from the GitHub API.
///
/// A full fetch lists every comment of the repository in one paginated pass;
/// incremental fetches, and full fetches whose bulk listing fails, ask per issue.
#[derive(Debug, Clone)]
pub struct GitHubIssues {
    api: ApiClient,
    api_url: String,
}

impl GitHubIssues {
    async fn comment_pages(&self, url: &str, extra: &[(&str, String)]) -> IssueResult<Vec<GitHubComment>> {
        let mut comments = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            query.extend(extra.iter().cloned());
            let (batch, headers): (Vec<GitHubComment>, _) = self
                .api
                .get_json(url, &query, &ApiAuth::Bearer)
                .await
                .map_err(to_issue_error)?;
            comments.extend(batch);

            if !has_next_page(&headers) {
                return Ok(comments);
            }
            page += 1;
        }
    }

    async fn comments(&self, repo: &RepositoryDescriptor, number: u64) -> IssueResult<Vec<IssueComment>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, repo.owner, repo.name, number
        );
        let comments = self.comment_pages(&url, &[]).await?;
        Ok(comments.into_iter().map(Into::into).collect())
    }

    /// Every comment in the repository, keyed by issue number
    async fn all_comments(&self, repo: &RepositoryDescriptor) -> IssueResult<HashMap<u64, Vec<IssueComment>>> {
        let url = format!("{}/repos/{}/{}/issues/comments", self.api_url, repo.owner, repo.name);
        let order = [("sort", "updated".to_string()), ("direction", "asc".to_string())];

        let mut by_issue: HashMap<u64, Vec<IssueComment>> = HashMap::new();
        for comment in self.comment_pages(&url, &order).await? {
            if let Some(number) = issue_number(&comment.issue_url) {
                by_issue.entry(number).or_default().push(comment.into());
            }
        }
        Ok(by_issue)
    }
}

#[async_trait]
impl IssueSource for GitHubIssues {
    async fn fetch_issues(
        &self,
        repo: &RepositoryDescriptor,
        since: Option<DateTime<Utc>>,
    ) -> IssueResult<Vec<Issue>> {
        let url = format!("{}/repos/{}/{}/issues", self.api_url, repo.owner, repo.name);
        let mut raw = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("state", "all".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(since) = since {
                query.push(("since", since.to_rfc3339()));
            }

            let (batch, headers): (Vec<GitHubIssue>, _) = self
                .api
                .get_json(&url, &query, &ApiAuth::Bearer)
                .await
                .map_err(to_issue_error)?;
            raw.extend(batch.into_iter().filter(|i| i.pull_request.is_none()));

            if !has_next_page(&headers) {
                break;
            }
            page += 1;
        }

        tracing::debug!("Found {} issues for {}", raw.len(), repo.full_name());

        let mut bulk = if since.is_none() && !raw.is_empty() {
            match self.all_comments(repo).await {
                Ok(by_issue) => Some(by_issue),
                Err(e) => {
                    tracing::warn!(
                        "Bulk comment fetch failed for {}, falling back to per-issue: {}",
                        repo.full_name(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut issues = Vec::with_capacity(raw.len());
        for gh in raw {
            let comments = match bulk.as_mut() {
                Some(by_issue) => by_issue.remove(&gh.number).unwrap_or_default(),
                None if gh.comments > 0 => match self.comments(repo, gh.number).await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to fetch comments for issue #{} in {}: {}",
                            gh.number,
                            repo.full_name(),
                            e
                        );
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            issues.push(Issue {
                number: gh.number,
                title: gh.title,
                body: gh.body.unwrap_or_default(),
                state: gh.state,
                author: gh.user.into(),
                labels: gh.labels.into_iter().map(|l| l.name).collect(),
                assignees: gh.assignees.into_iter().map(Into::into).collect(),
                milestone: gh.milestone.map(|m| m.title).unwrap_or_default(),
                url: gh.html_url,
                created_at: gh.created_at,
                updated_at: gh.updated_at,
                closed_at: gh.closed_at,
                comments,
            });
        }

        Ok(issues)
    }
}
