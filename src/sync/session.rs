//! One complete backup run over a list of discovered repositories

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::concurrency::run_bounded;
use super::operation::{RepoSyncer, SyncSettings};
use super::stats::{SyncStats, SyncSummary};
use crate::config::{Config, ConfigError, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::git::GitExecutor;
use crate::issues::IssueError;
use crate::notification::{NotificationDispatcher, Notifier};
use crate::telemetry::{Telemetry, TracingTelemetry};
use crate::token::TokenRotator;
use crate::types::RepositoryDescriptor;

/// Event name reported to telemetry after every run
pub const SYNC_COMPLETED_EVENT: &str = "sync_completed";

/// Backs up the issues of one repository
#[async_trait]
pub trait IssueSync: Send + Sync {
    /// Returns the number of issues written
    async fn sync_issues(&self, repo: &RepositoryDescriptor) -> Result<usize, IssueError>;
}

/// Drives the sync engine for one run and reports the result.
///
/// Owns its [`SyncStats`]; two sessions never share counters.
pub struct SyncSession {
    config: Config,
    syncer: Arc<RepoSyncer>,
    stats: Arc<SyncStats>,
    issues: Option<Arc<dyn IssueSync>>,
    notifier: Arc<dyn Notifier>,
    telemetry: Arc<dyn Telemetry>,
}

impl SyncSession {
    /// Session with notifications taken from `config` and telemetry off
    pub fn new(config: Config, git: Arc<dyn GitExecutor>, tokens: Arc<TokenRotator>) -> Self {
        let stats = Arc::new(SyncStats::new());
        let syncer = RepoSyncer::new(
            SyncSettings::from_config(&config),
            git,
            tokens,
            Arc::clone(&stats),
        );
        let notifier = Arc::new(NotificationDispatcher::from_config(&config.notification));

        Self {
            config,
            syncer: Arc::new(syncer),
            stats,
            issues: None,
            notifier,
            telemetry: Arc::new(TracingTelemetry::disabled()),
        }
    }

    pub fn with_issue_sync(mut self, issues: Arc<dyn IssueSync>) -> Self {
        self.issues = Some(issues);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn syncer(&self) -> &RepoSyncer {
        &self.syncer
    }

    /// Sync every repository, then report and reset the counters.
    ///
    /// Individual failures end up in the returned summary. The only error is a
    /// concurrency outside the accepted range, rejected before any work starts.
    pub async fn run(&self, repos: Vec<RepositoryDescriptor>) -> crate::Result<SyncSummary> {
        let concurrency = self.config.concurrency;
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, concurrency
            ))
            .into());
        }

        tracing::info!("Total {} repositories: {}", self.config.platform, repos.len());

        let syncer = Arc::clone(&self.syncer);
        let stats = Arc::clone(&self.stats);
        let issues = if self.config.include_issues {
            self.issues.clone()
        } else {
            None
        };
        let include_wiki = self.config.include_wiki;

        run_bounded(repos, concurrency, move |repo| {
            let syncer = Arc::clone(&syncer);
            let stats = Arc::clone(&stats);
            let issues = issues.clone();
            async move {
                syncer.sync_repo(&repo).await;

                if repo.has_wiki && include_wiki {
                    syncer.sync_wiki(&repo).await;
                }

                if let Some(issues) = issues.filter(|_| repo.has_issues) {
                    sync_issues(issues.as_ref(), &stats, &repo).await;
                }
            }
        })
        .await;

        let summary = self.stats.snapshot();
        log_summary(&summary);

        if let Err(e) = self.notifier.notify(&summary).await {
            tracing::error!("Failed to send notifications: {}", e);
        }
        self.telemetry
            .capture(SYNC_COMPLETED_EVENT, self.run_properties(&summary));

        self.stats.reset();
        Ok(summary)
    }

    /// Flat run metadata handed to telemetry
    pub fn run_properties(&self, summary: &SyncSummary) -> BTreeMap<String, Value> {
        let cfg = &self.config;
        let properties = [
            ("platform", json!(cfg.platform.to_string())),
            ("clone_type", json!(cfg.clone_type().to_string())),
            ("concurrency", json!(cfg.concurrency)),
            ("include_wiki", json!(cfg.include_wiki)),
            ("include_issues", json!(cfg.include_issues)),
            ("include_forks", json!(cfg.include_forks)),
            ("repos_success", json!(summary.repos_success)),
            ("repos_failed", json!(summary.repos_failed.len())),
            ("wikis_success", json!(summary.wikis_success)),
            ("wikis_failed", json!(summary.wikis_failed.len())),
            ("issues_success", json!(summary.issues_success)),
            ("issues_failed", json!(summary.issues_failed.len())),
            ("app_version", json!(env!("CARGO_PKG_VERSION"))),
            ("os", json!(std::env::consts::OS)),
            ("arch", json!(std::env::consts::ARCH)),
        ];

        properties
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("syncer", &self.syncer)
            .field("issues", &self.issues.is_some())
            .finish_non_exhaustive()
    }
}

async fn sync_issues(issues: &dyn IssueSync, stats: &SyncStats, repo: &RepositoryDescriptor) {
    let id = repo.full_name();
    match issues.sync_issues(repo).await {
        Ok(count) => {
            tracing::info!("Synced {} issues for {}", count, id);
            stats.record_issues_success();
        }
        Err(e) => {
            tracing::error!("Failed to sync issues for {}: {}", id, e);
            stats.record_issues_failure(&id, &e);
        }
    }
}

/// Log the same report notifications carry, one line per failure
fn log_summary(summary: &SyncSummary) {
    for line in summary.format_message().lines() {
        if line.starts_with('✅') {
            tracing::info!("{}", line);
        } else {
            tracing::error!("{}", line);
        }
    }
}
