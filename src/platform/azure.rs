//! Azure DevOps projects
//!
//! Clones use the repository's web URL with a rotated PAT inserted after the
//! scheme; disabled repositories are skipped.

use async_trait::async_trait;
use serde::Deserialize;

use super::{server_url, ApiAuth, ApiClient, PlatformClient, PlatformError, PlatformResult};
use crate::config::Config;
use crate::types::{Platform, RepositoryDescriptor};

const API_VERSION: &str = "7.0";

/// `<protocol>://<domain>`, where the domain carries the organization
/// (`dev.azure.com/<org>`)
pub(crate) fn org_url(config: &Config) -> String {
    server_url(config)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureProject {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureRepo {
    name: String,
    web_url: String,
    project: AzureProject,
    #[serde(default)]
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct RepoList {
    #[serde(default)]
    value: Vec<AzureRepo>,
}

/// Lists the git repositories of the configured project
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    api: ApiClient,
    org_url: String,
}

impl AzureDevOpsClient {
    pub(crate) fn new(api: ApiClient, org_url: String) -> Self {
        Self { api, org_url }
    }
}

#[async_trait]
impl PlatformClient for AzureDevOpsClient {
    fn platform(&self) -> Platform {
        Platform::AzureDevOps
    }

    async fn discover(&self, config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        if config.workspace.is_empty() {
            return Err(PlatformError::Config("azure needs 'workspace' (the project)".to_string()));
        }

        let url = format!("{}/{}/_apis/git/repositories", self.org_url, config.workspace);
        let auth = ApiAuth::Basic {
            username: String::new(),
        };
        let (list, _): (RepoList, _) = self
            .api
            .get_json(&url, &[("api-version", API_VERSION.to_string())], &auth)
            .await?;

        let repos = list
            .value
            .into_iter()
            .filter(|repo| {
                if repo.is_disabled {
                    tracing::warn!("Skipping repo {} as it is disabled", repo.name);
                }
                !repo.is_disabled
            })
            .map(|repo| {
                tracing::debug!("Found repo: {} ({})", repo.name, repo.web_url);
                RepositoryDescriptor::new(repo.project.name, repo.name).with_url(repo.web_url, true)
            })
            .collect();

        Ok(repos)
    }
}
