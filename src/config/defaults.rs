use super::Config;
use crate::types::CloneType;

const DEFAULT_CONCURRENCY: usize = 5;

impl Config {
    /// Fill in values older config files leave empty and migrate the
    /// deprecated single `token` field into `tokens`.
    pub fn apply_defaults(&mut self) {
        if self.server.domain.is_empty() || self.server.protocol.is_empty() {
            if let Some(domain) = self.platform.default_domain() {
                if self.server.domain.is_empty() {
                    self.server.domain = domain.to_string();
                }
                if self.server.protocol.is_empty() {
                    self.server.protocol = "https".to_string();
                }
            }
        }

        if self.concurrency == 0 {
            tracing::warn!(
                "concurrency is not set in the config file, using {}",
                DEFAULT_CONCURRENCY
            );
            self.concurrency = DEFAULT_CONCURRENCY;
        }

        if self.clone_type.is_none() {
            tracing::warn!("clone_type is not set in the config file, using 'bare'");
            self.clone_type = Some(CloneType::Bare);
        }

        if let Some(token) = self.token.take().filter(|t| !t.is_empty()) {
            if self.tokens.is_empty() {
                tracing::warn!("'token' is deprecated, use the 'tokens' list instead");
            } else {
                tracing::warn!("both 'token' and 'tokens' are set, merging 'token' into 'tokens'");
            }
            self.tokens.insert(0, token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::types::Platform;

    fn with_platform(platform: Platform) -> Config {
        Config {
            platform,
            ..Config::default()
        }
    }

    #[test]
    fn test_platform_domains() {
        let cases = [
            (Platform::GitHub, "github.com"),
            (Platform::GitLab, "gitlab.com"),
            (Platform::Bitbucket, "bitbucket.org"),
            (Platform::Forgejo, "v9.next.forgejo.org"),
        ];

        for (platform, domain) in cases {
            let mut cfg = with_platform(platform);
            cfg.apply_defaults();
            assert_eq!(cfg.server.domain, domain);
            assert_eq!(cfg.server.protocol, "https");
            assert_eq!(cfg.clone_type, Some(CloneType::Bare));
            assert_eq!(cfg.concurrency, 5);
        }
    }

    #[test]
    fn test_raw_platform_has_no_server_default() {
        let mut cfg = with_platform(Platform::Raw);
        cfg.apply_defaults();
        assert!(cfg.server.domain.is_empty());
    }

    #[test]
    fn test_keeps_existing_values() {
        let mut cfg = Config {
            platform: Platform::GitHub,
            clone_type: Some(CloneType::Mirror),
            concurrency: 10,
            server: ServerConfig {
                domain: "custom.github.com".to_string(),
                protocol: "http".to_string(),
            },
            ..Config::default()
        };
        cfg.apply_defaults();

        assert_eq!(cfg.server.domain, "custom.github.com");
        assert_eq!(cfg.server.protocol, "http");
        assert_eq!(cfg.clone_type, Some(CloneType::Mirror));
        assert_eq!(cfg.concurrency, 10);
    }

    #[test]
    fn test_merges_single_token_first() {
        let mut cfg = Config {
            token: Some("single".to_string()),
            tokens: vec!["t1".to_string(), "t2".to_string()],
            ..Config::default()
        };
        cfg.apply_defaults();

        assert_eq!(cfg.tokens, vec!["single", "t1", "t2"]);
        assert!(cfg.token.is_none());
    }

    #[test]
    fn test_converts_single_token() {
        let mut cfg = Config {
            token: Some("single".to_string()),
            ..Config::default()
        };
        cfg.apply_defaults();

        assert_eq!(cfg.tokens, vec!["single"]);
        assert!(cfg.token.is_none());
    }
}
