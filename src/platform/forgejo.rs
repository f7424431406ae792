//! Forgejo (and Gitea-compatible) servers via the v1 API

use async_trait::async_trait;
use serde::Deserialize;

use super::{server_url, ApiAuth, ApiClient, PlatformClient, PlatformResult};
use crate::config::Config;
use crate::filter::{Candidate, RepoFilter};
use crate::types::{Platform, RepositoryDescriptor};

const PAGE_SIZE: usize = 50;

pub(crate) fn api_base(config: &Config) -> String {
    format!("{}/api/v1", server_url(config))
}

#[derive(Debug, Deserialize)]
struct ForgejoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ForgejoRepo {
    name: String,
    full_name: String,
    owner: ForgejoOwner,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    has_issues: bool,
}

/// Lists repositories of the authenticated user.
///
/// Repo rules match against `owner/name`.
#[derive(Debug, Clone)]
pub struct ForgejoClient {
    api: ApiClient,
    filter: RepoFilter,
    api_url: String,
}

impl ForgejoClient {
    pub(crate) fn new(api: ApiClient, filter: RepoFilter, api_url: String) -> Self {
        Self {
            api,
            filter,
            api_url,
        }
    }
}

#[async_trait]
impl PlatformClient for ForgejoClient {
    fn platform(&self) -> Platform {
        Platform::Forgejo
    }

    async fn discover(&self, _config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        let url = format!("{}/user/repos", self.api_url);
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [("limit", PAGE_SIZE.to_string()), ("page", page.to_string())];
            let (batch, _): (Vec<ForgejoRepo>, _) =
                self.api.get_json(&url, &query, &ApiAuth::TokenHeader).await?;
            let last_page = batch.len() < PAGE_SIZE;

            for repo in batch {
                let candidate = Candidate {
                    name: &repo.full_name,
                    owner: &repo.owner.login,
                    owner_is_org: false,
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

            if last_page {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenRotator;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_discover_matches_full_name() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/user/repos")
            .match_query(Matcher::UrlEncoded("page".to_string(), "1".to_string()))
            .match_header("authorization", "token fj")
            .with_body(
                json!([
                    { "name": "site", "full_name": "alice/site", "owner": { "login": "alice" }, "has_wiki": true },
                    { "name": "notes", "full_name": "alice/notes", "owner": { "login": "alice" } }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let config = Config {
            exclude_repos: vec!["alice/notes".to_string()],
            ..Config::default()
        };
        let api = ApiClient::new(Arc::new(TokenRotator::new(vec!["fj".to_string()]))).unwrap();
        let client = ForgejoClient::new(api, RepoFilter::from_config(&config).unwrap(), server.url());

        let repos = client.discover(&config).await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].full_name(), "alice/site");
        assert!(repos[0].has_wiki);
    }
}
