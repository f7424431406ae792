//! Literal git URLs from `raw_git_urls`, cloned without credentials

use async_trait::async_trait;

use super::{PlatformClient, PlatformError, PlatformResult};
use crate::config::Config;
use crate::types::{Platform, RepositoryDescriptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct RawClient;

#[async_trait]
impl PlatformClient for RawClient {
    fn platform(&self) -> Platform {
        Platform::Raw
    }

    async fn discover(&self, config: &Config) -> PlatformResult<Vec<RepositoryDescriptor>> {
        if config.raw_git_urls.is_empty() {
            return Err(PlatformError::Config("no raw git URLs provided".to_string()));
        }
        Ok(config
            .raw_git_urls
            .iter()
            .map(|url| RepositoryDescriptor::raw(url.as_str()))
            .collect())
    }
}
