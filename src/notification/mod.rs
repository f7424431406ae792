//! End-of-run notifications
//!
//! The session hands its [`SyncSummary`] to a [`Notifier`]. The default
//! notifier is a [`NotificationDispatcher`] that fans the message out to every
//! configured provider (ntfy, Gotify).

mod gotify;
mod ntfy;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;

use crate::config::NotificationConfig;
use crate::sync::SyncSummary;

pub use gotify::GotifyProvider;
pub use ntfy::NtfyProvider;

/// Title used for every notification
pub const NOTIFICATION_TITLE: &str = "forgesync summary";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{provider}: {message}")]
    Misconfigured {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: notification failed with status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("notification errors: {}", .0.join("; "))]
    Providers(Vec<String>),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Receives the summary of a finished run
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &SyncSummary) -> NotifyResult<()>;
}

/// A single delivery channel
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, title: &str, message: &str) -> NotifyResult<()>;
}

/// Sends the run summary to every configured provider
pub struct NotificationDispatcher {
    enabled: bool,
    only_failures: bool,
    providers: Vec<Box<dyn NotificationProvider>>,
}

impl NotificationDispatcher {
    pub fn from_config(config: &NotificationConfig) -> Self {
        let client = Client::new();
        let mut providers: Vec<Box<dyn NotificationProvider>> = Vec::new();

        if let Some(ntfy) = &config.ntfy {
            providers.push(Box::new(NtfyProvider::new(client.clone(), ntfy)));
        }
        if let Some(gotify) = &config.gotify {
            providers.push(Box::new(GotifyProvider::new(client, gotify)));
        }

        Self {
            enabled: config.enabled,
            only_failures: config.only_failures,
            providers,
        }
    }

    /// Dispatcher that never sends anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            only_failures: true,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn NotificationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Whether `summary` would be sent at all
    pub fn should_notify(&self, summary: &SyncSummary) -> bool {
        self.enabled && !(self.only_failures && !summary.has_failures())
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("NotificationDispatcher")
            .field("enabled", &self.enabled)
            .field("only_failures", &self.only_failures)
            .field("providers", &names)
            .finish()
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, summary: &SyncSummary) -> NotifyResult<()> {
        if !self.should_notify(summary) {
            return Ok(());
        }

        let message = summary.format_message();
        let sends = self
            .providers
            .iter()
            .map(|provider| provider.send(NOTIFICATION_TITLE, &message));
        let errors: Vec<String> = join_all(sends)
            .await
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();

        if !errors.is_empty() {
            return Err(NotifyError::Providers(errors));
        }

        if !self.providers.is_empty() {
            tracing::info!("Notifications sent successfully");
        }
        Ok(())
    }
}

pub(crate) fn check_status(provider: &'static str, response: &reqwest::Response) -> NotifyResult<()> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(NotifyError::Status {
            provider,
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationProvider for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn send(&self, title: &str, message: &str) -> NotifyResult<()> {
            assert_eq!(title, NOTIFICATION_TITLE);
            assert!(message.contains("Repositories"));
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Status {
                    provider: "counting",
                    status: 500,
                })
            } else {
                Ok(())
            }
        }
    }

    fn dispatcher(enabled: bool, only_failures: bool, sent: &Arc<AtomicUsize>) -> NotificationDispatcher {
        NotificationDispatcher::from_config(&NotificationConfig {
            enabled,
            only_failures,
            ..NotificationConfig::default()
        })
        .with_provider(Box::new(Counting {
            sent: Arc::clone(sent),
            fail: false,
        }))
    }

    fn failed_summary() -> SyncSummary {
        SyncSummary {
            repos_failed: vec!["a/b (Error: boom)".to_string()],
            ..SyncSummary::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let sent = Arc::new(AtomicUsize::new(0));
        dispatcher(false, false, &sent).notify(&failed_summary()).await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_only_failures_skips_clean_runs() {
        let sent = Arc::new(AtomicUsize::new(0));
        let d = dispatcher(true, true, &sent);

        d.notify(&SyncSummary::default()).await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        d.notify(&failed_summary()).await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_always_notify() {
        let sent = Arc::new(AtomicUsize::new(0));
        dispatcher(true, false, &sent).notify(&SyncSummary::default()).await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_errors_are_collected() {
        let sent = Arc::new(AtomicUsize::new(0));
        let d = dispatcher(true, false, &sent).with_provider(Box::new(Counting {
            sent: Arc::clone(&sent),
            fail: true,
        }));

        let err = d.notify(&SyncSummary::default()).await.unwrap_err();
        assert_eq!(sent.load(Ordering::SeqCst), 2);
        assert!(matches!(err, NotifyError::Providers(ref e) if e.len() == 1));
        assert_eq!(
            err.to_string(),
            "notification errors: counting: notification failed with status 500"
        );
    }
}
