//! Per-session success/failure accounting

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::operation::{SyncCategory, SyncOutcome};

/// Immutable copy of a session's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub repos_success: usize,
    pub repos_failed: Vec<String>,
    pub wikis_success: usize,
    pub wikis_failed: Vec<String>,
    pub issues_success: usize,
    pub issues_failed: Vec<String>,
}

impl SyncSummary {
    pub fn has_failures(&self) -> bool {
        !self.repos_failed.is_empty() || !self.wikis_failed.is_empty() || !self.issues_failed.is_empty()
    }

    pub fn total_failures(&self) -> usize {
        self.repos_failed.len() + self.wikis_failed.len() + self.issues_failed.len()
    }

    /// Multi-line report used for logs and notification bodies
    pub fn format_message(&self) -> String {
        let mut message = String::new();
        push_section(&mut message, "Repositories", "repositories", self.repos_success, &self.repos_failed);
        push_section(&mut message, "Wikis", "wikis", self.wikis_success, &self.wikis_failed);
        push_section(&mut message, "Issues", "issues", self.issues_success, &self.issues_failed);
        message
    }
}

fn push_section(out: &mut String, title: &str, noun: &str, success: usize, failed: &[String]) {
    out.push_str(&format!("✅ {}: {} successfully synced\n", title, success));
    if !failed.is_empty() {
        out.push_str(&format!("❌ Failed {}: {}\n", noun, failed.len()));
        for entry in failed {
            out.push_str(&format!("- {}\n", entry));
        }
    }
}

/// Thread-safe collector shared by every worker of one session
#[derive(Debug, Default)]
pub struct SyncStats {
    inner: Mutex<SyncSummary>,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    // counters stay meaningful after a panicking worker, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, SyncSummary> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_repo_success(&self) {
        self.lock().repos_success += 1;
    }

    pub fn record_repo_failure(&self, id: &str, error: &dyn std::fmt::Display) {
        self.lock().repos_failed.push(failure_entry(id, error));
    }

    pub fn record_wiki_success(&self) {
        self.lock().wikis_success += 1;
    }

    pub fn record_wiki_failure(&self, id: &str, error: &dyn std::fmt::Display) {
        self.lock().wikis_failed.push(failure_entry(id, error));
    }

    pub fn record_issues_success(&self) {
        self.lock().issues_success += 1;
    }

    pub fn record_issues_failure(&self, id: &str, error: &dyn std::fmt::Display) {
        self.lock().issues_failed.push(failure_entry(id, error));
    }

    /// Record a single operation's outcome; benign outcomes are not counted
    pub fn record(&self, outcome: &SyncOutcome) {
        match (outcome.category, &outcome.error) {
            (_, _) if outcome.benign => {}
            (SyncCategory::Repo, None) => self.record_repo_success(),
            (SyncCategory::Repo, Some(e)) => self.record_repo_failure(&outcome.id, e),
            (SyncCategory::Wiki, None) => self.record_wiki_success(),
            (SyncCategory::Wiki, Some(e)) => self.record_wiki_failure(&outcome.id, e),
            (SyncCategory::Issues, None) => self.record_issues_success(),
            (SyncCategory::Issues, Some(e)) => self.record_issues_failure(&outcome.id, e),
        }
    }

    /// Deep copy of the current counters
    pub fn snapshot(&self) -> SyncSummary {
        self.lock().clone()
    }

    /// Zero every counter. Only call once all workers of the session are done.
    pub fn reset(&self) {
        *self.lock() = SyncSummary::default();
    }
}

fn failure_entry(id: &str, error: &dyn std::fmt::Display) -> String {
    format!("{} (Error: {})", id, error)
}
