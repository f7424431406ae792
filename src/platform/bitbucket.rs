//! Bitbucket Cloud workspaces via the 2.0 API

use async_trait::async_trait;
use serde::Deserialize;

use super::{ApiAuth, ApiClient, PlatformClient, PlatformError, PlatformResult};
use crate::config::Config;
use crate::filter::{Candidate, RepoFilter};
use crate::types::{Platform, RepositoryDescriptor};

pub(crate) const API_BASE: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Deserialize)]
struct BitbucketRepo {
    slug: String,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    has_issues: bool,
    #[serde(default)]
    parent: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RepoPage {
    #[serde(default)]
    values: Vec<BitbucketRepo>,
    #[serde(default)]
    next: Option<String>,
}

/// Lists every repository in the configured workspace
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    api: ApiClient,
    filter: RepoFilter,
    api_url: String,
}

impl BitbucketClient {
    pub(crate) fn new(api: ApiClient, filter: RepoFilter, api_url: String) -> Self {
        Self {
            api,
            filter,
            api_url,
        }
    }
}

#[async_trait]
impl PlatformClient for BitbucketClient {
    fn platform(&self) -> Platform {
        Platform::Bitbucket
    }

    async fn discover(&self, config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        if config.workspace.is_empty() {
            return Err(PlatformError::Config("bitbucket needs 'workspace'".to_string()));
        }

        let auth = ApiAuth::Basic {
            username: config.username.clone(),
        };
        let url = format!("{}/repositories/{}", self.api_url, config.workspace);
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let query = [("pagelen", "100".to_string()), ("page", page.to_string())];
            let (batch, _): (RepoPage, _) = self.api.get_json(&url, &query, &auth).await?;

            for repo in batch.values {
                // workspace repos have no org owner to match against
                let candidate = Candidate {
                    name: &repo.slug,
                    owner: &config.workspace,
                    owner_is_org: false,
                    fork: repo.parent.is_some(),
                };
                if self.filter.allows(&candidate) {
                    repos.push(
                        RepositoryDescriptor::new(config.workspace.clone(), repo.slug)
                            .with_wiki(repo.has_wiki)
                            .with_issues(repo.has_issues),
                    );
                }
            }

            if batch.next.is_none() {
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
    async fn test_discover_workspace_pages() {
        let mut server = Server::new_async().await;
        let _page1 = server
            .mock("GET", "/repositories/team")
            .match_query(Matcher::UrlEncoded("page".to_string(), "1".to_string()))
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_body(
                json!({
                    "values": [{ "slug": "app", "has_wiki": true }],
                    "next": "https://api.bitbucket.org/2.0/repositories/team?page=2"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _page2 = server
            .mock("GET", "/repositories/team")
            .match_query(Matcher::UrlEncoded("page".to_string(), "2".to_string()))
            .with_body(
                json!({
                    "values": [
                        { "slug": "lib" },
                        { "slug": "fork", "parent": { "full_name": "other/fork" } }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let config = Config {
            platform: Platform::Bitbucket,
            username: "alice".to_string(),
            workspace: "team".to_string(),
            ..Config::default()
        };
        let api = ApiClient::new(Arc::new(TokenRotator::new(vec!["app-pass".to_string()]))).unwrap();
        let client = BitbucketClient::new(api, RepoFilter::from_config(&config).unwrap(), server.url());

        let repos = client.discover(&config).await.unwrap();
        let names: Vec<_> = repos.iter().map(RepositoryDescriptor::full_name).collect();
        assert_eq!(names, vec!["team/app", "team/lib"]);
        assert!(repos[0].has_wiki);
    }
}
