use super::{Config, ConfigError, ConfigResult, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::types::Platform;

impl Config {
    /// Reject configurations the sync engine cannot run with.
    ///
    /// Expects `apply_defaults` to have run first.
    pub fn validate(&self) -> ConfigResult<()> {
        let needs_credentials = self.platform.requires_credentials();

        if needs_credentials && self.username.is_empty() {
            return invalid("username cannot be empty");
        }

        if needs_credentials && self.tokens.iter().all(String::is_empty) {
            return invalid("at least one token is required in 'tokens'");
        }

        if self.backup_dir.as_os_str().is_empty() {
            return invalid("backup directory cannot be empty");
        }

        if needs_credentials {
            if self.server.domain.is_empty() {
                return invalid("server domain cannot be empty");
            }
            if self.server.protocol != "https" && self.server.protocol != "http" {
                return invalid("server protocol can only be http or https");
            }
        }

        if matches!(self.platform, Platform::Bitbucket | Platform::AzureDevOps)
            && self.workspace.is_empty()
        {
            return invalid(&format!("workspace is required for {}", self.platform));
        }

        if self.platform == Platform::Raw && self.raw_git_urls.is_empty() {
            return invalid("raw platform needs at least one entry in 'raw_git_urls'");
        }

        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return invalid(&format!(
                "concurrency must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, self.concurrency
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigResult<()> {
    Err(ConfigError::Invalid(message.to_string()))
}
