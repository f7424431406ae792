//! Include/exclude rules applied to discovered repositories
//!
//! Patterns are shell-style globs (`*` does not cross `/`). Precedence:
//! `include_orgs` decides alone when set; otherwise `exclude_orgs`, then
//! `include_repos` (which decides alone when set), then `exclude_repos`, then
//! the fork rule.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::Config;

/// What the filter needs to know about a discovered repository
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Name matched by repo rules (plain name or `owner/name`, per platform)
    pub name: &'a str,
    pub owner: &'a str,
    /// Owner is an organization or group rather than a user
    pub owner_is_org: bool,
    pub fork: bool,
}

#[derive(Debug, Clone)]
struct Patterns {
    set: GlobSet,
    len: usize,
}

impl Patterns {
    fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(glob(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
            len: patterns.len(),
        })
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn matches(&self, value: &str) -> bool {
        self.set.is_match(value)
    }
}

fn glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Compiled filtering rules from the config
#[derive(Debug, Clone)]
pub struct RepoFilter {
    include_orgs: Patterns,
    exclude_orgs: Patterns,
    include_repos: Patterns,
    exclude_repos: Patterns,
    include_forks: bool,
}

impl RepoFilter {
    pub fn from_config(config: &Config) -> Result<Self, globset::Error> {
        Ok(Self {
            include_orgs: Patterns::new(&config.include_orgs)?,
            exclude_orgs: Patterns::new(&config.exclude_orgs)?,
            include_repos: Patterns::new(&config.include_repos)?,
            exclude_repos: Patterns::new(&config.exclude_repos)?,
            include_forks: config.include_forks,
        })
    }

    pub fn allows(&self, repo: &Candidate<'_>) -> bool {
        if !self.include_orgs.is_empty() {
            let included = repo.owner_is_org && self.include_orgs.matches(repo.owner);
            if included {
                tracing::debug!("[include_orgs] Repo included: {}", repo.name);
            }
            return included;
        }

        if repo.owner_is_org && self.exclude_orgs.matches(repo.owner) {
            tracing::debug!("[exclude_orgs] Repo excluded: {}", repo.name);
            return false;
        }

        if !self.include_repos.is_empty() {
            let included = self.include_repos.matches(repo.name);
            if included {
                tracing::debug!("[include_repos] Repo included: {}", repo.name);
            }
            return included;
        }

        if self.exclude_repos.matches(repo.name) {
            tracing::debug!("[exclude_repos] Repo excluded: {}", repo.name);
            return false;
        }

        if repo.fork && !self.include_forks {
            tracing::debug!("[include_forks] Repo excluded: {}", repo.name);
            return false;
        }

        tracing::debug!("Repo included: {}", repo.name);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(mutate: impl FnOnce(&mut Config)) -> RepoFilter {
        let mut config = Config::default();
        mutate(&mut config);
        RepoFilter::from_config(&config).unwrap()
    }

    fn user_repo(name: &str) -> Candidate<'_> {
        Candidate {
            name,
            owner: "alice",
            owner_is_org: false,
            fork: false,
        }
    }

    fn org_repo<'a>(owner: &'a str, name: &'a str) -> Candidate<'a> {
        Candidate {
            name,
            owner,
            owner_is_org: true,
            fork: false,
        }
    }

    #[test]
    fn test_default_allows_everything_but_forks() {
        let f = filter(|_| {});
        assert!(f.allows(&user_repo("tools")));
        assert!(f.allows(&org_repo("acme", "api")));
        assert!(!f.allows(&Candidate {
            fork: true,
            ..user_repo("fork")
        }));
    }

    #[test]
    fn test_include_forks() {
        let f = filter(|c| c.include_forks = true);
        assert!(f.allows(&Candidate {
            fork: true,
            ..user_repo("fork")
        }));
    }

    #[test]
    fn test_include_orgs_wins() {
        let f = filter(|c| {
            c.include_orgs = vec!["acme-*".to_string()];
            c.exclude_repos = vec!["api".to_string()];
        });
        assert!(f.allows(&org_repo("acme-labs", "api")));
        assert!(!f.allows(&org_repo("other", "api")));
        assert!(!f.allows(&user_repo("tools")));
    }

    #[test]
    fn test_exclude_orgs() {
        let f = filter(|c| c.exclude_orgs = vec!["legacy".to_string()]);
        assert!(!f.allows(&org_repo("legacy", "api")));
        assert!(f.allows(&org_repo("acme", "api")));
        // only organization owners are matched
        assert!(f.allows(&Candidate {
            owner: "legacy",
            ..user_repo("tools")
        }));
    }

    #[test]
    fn test_include_repos_wins_over_exclude() {
        let f = filter(|c| {
            c.include_repos = vec!["svc-*".to_string()];
            c.exclude_repos = vec!["svc-old".to_string()];
        });
        assert!(f.allows(&user_repo("svc-old")));
        assert!(f.allows(&Candidate {
            fork: true,
            ..user_repo("svc-fork")
        }));
        assert!(!f.allows(&user_repo("web")));
    }

    #[test]
    fn test_exclude_repos_glob() {
        let f = filter(|c| c.exclude_repos = vec!["*-archive".to_string()]);
        assert!(!f.allows(&user_repo("docs-archive")));
        assert!(f.allows(&user_repo("docs")));
    }

    #[test]
    fn test_star_does_not_cross_slash() {
        let f = filter(|c| c.include_repos = vec!["acme/*".to_string()]);
        assert!(f.allows(&user_repo("acme/api")));
        assert!(!f.allows(&user_repo("acme/group/api")));
    }

    #[test]
    fn test_invalid_pattern() {
        let mut config = Config::default();
        config.include_repos = vec!["[".to_string()];
        assert!(RepoFilter::from_config(&config).is_err());
    }
}
