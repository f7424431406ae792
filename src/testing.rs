//! Test doubles shared by unit and integration tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::git::{GitCommand, GitError, GitExecutor, GitOutput, GitResult};

#[derive(Debug)]
struct Rule {
    needle: String,
    /// `None` fails forever
    remaining: Option<usize>,
    output: String,
}

/// A [`GitExecutor`] that records every command and replays scripted failures.
///
/// Commands succeed unless a rule matches. A rule matches when any argument
/// or the working directory contains its needle.
#[derive(Debug, Default)]
pub struct ScriptedGit {
    commands: Mutex<Vec<GitCommand>>,
    rules: Mutex<Vec<Rule>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `times` matching commands, then succeed
    pub fn fail_times(self, needle: &str, times: usize, output: &str) -> Self {
        self.push_rule(needle, Some(times), output)
    }

    /// Fail every matching command
    pub fn fail_always(self, needle: &str, output: &str) -> Self {
        self.push_rule(needle, None, output)
    }

    /// Hold each command for `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn push_rule(self, needle: &str, remaining: Option<usize>, output: &str) -> Self {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Rule {
                needle: needle.to_string(),
                remaining,
                output: output.to_string(),
            });
        self
    }

    /// Every command issued so far, in issue order
    pub fn commands(&self) -> Vec<GitCommand> {
        self.commands
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Commands with an argument containing `needle`
    pub fn commands_matching(&self, needle: &str) -> Vec<GitCommand> {
        self.commands()
            .into_iter()
            .filter(|c| c.args.iter().any(|a| a.contains(needle)))
            .collect()
    }

    /// Highest number of commands that were executing at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, command: &GitCommand) -> Option<String> {
        let mut rules = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let cwd = command
            .cwd
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        for rule in rules.iter_mut() {
            let matches = command.args.iter().any(|a| a.contains(&rule.needle))
                || cwd.contains(&rule.needle);
            if !matches {
                continue;
            }
            match rule.remaining {
                None => return Some(rule.output.clone()),
                Some(0) => continue,
                Some(n) => {
                    rule.remaining = Some(n - 1);
                    return Some(rule.output.clone());
                }
            }
        }
        None
    }
}

#[async_trait]
impl GitExecutor for ScriptedGit {
    async fn execute(&self, command: &GitCommand) -> GitResult<GitOutput> {
        self.commands
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(command.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.scripted_failure(command);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(output) => Err(GitError::Failed {
                code: Some(128),
                output,
            }),
            None => Ok(GitOutput::default()),
        }
    }
}
