//! Platform discovery
//!
//! Each hosting platform implements [`PlatformClient`]: it lists the
//! repositories the configured account can see, applies the config's
//! include/exclude rules, and hands [`RepositoryDescriptor`]s to a
//! [`SyncSession`]. [`platform_client`] picks the implementation once per run.

mod azure;
mod bitbucket;
mod forgejo;
mod github;
mod gitlab;
mod raw;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::filter::RepoFilter;
use crate::issues::{IssueArchive, IssueArchiver, IssueError, IssueSource};
use crate::sync::{SyncSession, SyncSummary};
use crate::token::TokenRotator;
use crate::types::{Platform, RepositoryDescriptor};

pub use azure::AzureDevOpsClient;
pub use bitbucket::BitbucketClient;
pub use forgejo::ForgejoClient;
pub use github::{GitHubClient, GitHubIssues};
pub use gitlab::{GitLabClient, GitLabIssues};
pub use raw::RawClient;

/// Errors while discovering repositories
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Missing configuration: {0}")]
    Config(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// A hosting platform the engine can back up
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Repositories to back up, already filtered by the config rules
    async fn discover(&self, config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>>;

    /// Where issues come from, for platforms that support issue backup
    fn issue_source(&self) -> Option<Arc<dyn IssueSource>> {
        None
    }

    /// Discover, then run `session` over the result
    async fn sync(&self, session: SyncSession) -> crate::Result<SyncSummary> {
        tracing::debug!("Fetching list of repositories");
        let repos = self.discover(session.config()).await?;

        let session = match self.issue_source() {
            Some(source) if session.config().include_issues => {
                let archive = IssueArchive::new(session.config().backup_dir.clone());
                session.with_issue_sync(Arc::new(IssueArchiver::new(source, archive)))
            }
            _ => session,
        };

        session.run(repos).await
    }
}

/// Client for the configured platform, sharing `tokens` with the sync session
pub fn platform_client(
    config: &Config,
    tokens: Arc<TokenRotator>,
) -> PlatformResult<Box<dyn PlatformClient>> {
    let api = ApiClient::new(tokens)?;
    let filter = RepoFilter::from_config(config)?;

    let client: Box<dyn PlatformClient> = match config.platform {
        Platform::GitHub => Box::new(GitHubClient::new(api, filter, github::api_base(config))),
        Platform::GitLab => Box::new(GitLabClient::new(api, filter, gitlab::api_base(config))),
        Platform::Bitbucket => Box::new(BitbucketClient::new(
            api,
            filter,
            bitbucket::API_BASE.to_string(),
        )),
        Platform::Forgejo => Box::new(ForgejoClient::new(api, filter, forgejo::api_base(config))),
        Platform::AzureDevOps => Box::new(AzureDevOpsClient::new(api, azure::org_url(config))),
        Platform::Raw => Box::new(RawClient),
    };
    Ok(client)
}

/// How a platform expects the token to be presented
#[derive(Debug, Clone)]
pub(crate) enum ApiAuth {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `PRIVATE-TOKEN: <token>`
    PrivateToken,
    /// `Authorization: token <token>`
    TokenHeader,
    /// HTTP basic auth with the token as password
    Basic { username: String },
}

impl ApiAuth {
    fn apply(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        if token.is_empty() {
            return request;
        }
        match self {
            ApiAuth::Bearer => request.bearer_auth(token),
            ApiAuth::PrivateToken => request.header("PRIVATE-TOKEN", token),
            ApiAuth::TokenHeader => request.header("Authorization", format!("token {}", token)),
            ApiAuth::Basic { username } => request.basic_auth(username, Some(token)),
        }
    }
}

/// HTTP client that rotates through the token pool.
///
/// A request that fails at the network level or with an auth, rate-limit or
/// server status is retried with the next token, at most once per token.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    http: Client,
    tokens: Arc<TokenRotator>,
}

impl ApiClient {
    pub(crate) fn new(tokens: Arc<TokenRotator>) -> PlatformResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("forgesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, tokens })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: &ApiAuth,
    ) -> PlatformResult<(T, HeaderMap)> {
        let attempts = self.tokens.len().max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let token = self.tokens.next();
            let request = auth.apply(self.http.get(url).query(query), &token);

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let headers = response.headers().clone();
                    return Ok((response.json::<T>().await?, headers));
                }
                Ok(response) => {
                    let status = response.status();
                    let message = response.text().await.unwrap_or_default();
                    let error = status_error(status, message);
                    if !is_rotatable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => PlatformError::Network(e),
            };

            if attempt < attempts {
                tracing::debug!("Error with current token, trying next token: {}", error);
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| PlatformError::Auth("no token available".to_string())))
    }
}

fn is_rotatable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) || status.is_server_error()
}

fn status_error(status: StatusCode, message: String) -> PlatformError {
    if status == StatusCode::UNAUTHORIZED {
        return PlatformError::Auth(message);
    }
    PlatformError::Api {
        status: status.as_u16(),
        message,
    }
}

pub(crate) fn to_issue_error(e: PlatformError) -> IssueError {
    match e {
        PlatformError::Network(e) => IssueError::Http(e),
        other => IssueError::Api(other.to_string()),
    }
}

/// `<protocol>://<domain>`
pub(crate) fn server_url(config: &Config) -> String {
    format!("{}://{}", config.server.protocol, config.server.domain)
}
